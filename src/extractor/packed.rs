//! Hosts whose player config sits in a packed script.
//!
//! Pattern contract, after unpacking:
//! `sources:[{file:"<media url>",label:"720p"}]` and optionally
//! `tracks:[{file:"<subs>.vtt",label:"Arabic",kind:"captions"}]`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{absolutize, fetch_embed, with_playback_headers, ExtractorDescriptor};
use crate::error::{ExtractError, Result};
use crate::http_client::Fetcher;
use crate::link::{ContainerHint, Extraction, PlayableLink, Quality, SubtitleFile};
use crate::unpack;

static FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bfile\s*:\s*["']([^"']+)["']"#).expect("static regex"));

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\blabel\s*:\s*["']([^"']*)["']"#).expect("static regex"));

static KIND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bkind\s*:\s*["']([^"']*)["']"#).expect("static regex"));

pub(crate) async fn resolve(
    descriptor: &ExtractorDescriptor,
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<Extraction> {
    let page = fetch_embed(descriptor, fetcher, url, referer).await?;
    extract_from_page(descriptor.name, &page.body, url, fetcher.user_agent())
}

/// Unpack every packed script on the page and collect what the first
/// yielding script lists.
pub(crate) fn extract_from_page(
    source_name: &str,
    html: &str,
    embed_url: &str,
    user_agent: Option<&str>,
) -> Result<Extraction> {
    let scripts = unpack::find_packed(html);
    if scripts.is_empty() {
        return Err(ExtractError::NotFound(format!("{embed_url}: no packed script")));
    }

    let mut last_error = None;
    for packed in scripts {
        match unpack::unpack(packed) {
            Ok(script) => {
                let extraction = player_config_links(source_name, &script, embed_url, user_agent);
                if !extraction.is_empty() {
                    return Ok(extraction);
                }
                debug!(source = source_name, "Unpacked script lists no media");
            }
            Err(e) => {
                debug!(source = source_name, error = %e, "Packed script rejected");
                last_error = Some(e);
            }
        }
    }

    // A malformed script outranks "nothing in it"
    Err(last_error.unwrap_or_else(|| {
        ExtractError::NotFound(format!("{embed_url}: unpacked scripts list no media"))
    }))
}

/// Scan a player config for `file:` entries.
///
/// Media URLs become links in discovery order, one per distinct URL.
/// Entries whose container can't be recognized are dropped rather than
/// guessed at. `.vtt`/`.srt` entries become subtitles.
pub(crate) fn player_config_links(
    source_name: &str,
    script: &str,
    embed_url: &str,
    user_agent: Option<&str>,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut seen = HashSet::new();

    for caps in FILE.captures_iter(script) {
        let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(url) = absolutize(embed_url, raw.as_str()) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let entry = enclosing_object(script, whole.start(), whole.end());
        let label = LABEL.captures(entry).map(|c| c[1].trim().to_string());
        let kind = KIND.captures(entry).map(|c| c[1].to_ascii_lowercase());

        if is_subtitle(&url, kind.as_deref()) {
            extraction.subtitles.push(SubtitleFile {
                url,
                language: label.filter(|l| !l.is_empty()).unwrap_or_else(|| "Unknown".into()),
            });
            continue;
        }
        if kind.as_deref() == Some("thumbnails") {
            continue;
        }

        let container = ContainerHint::from_url(&url);
        if !container.is_known() {
            debug!(source = source_name, url = %url, "Skipping entry with unknown container");
            continue;
        }

        let quality = label
            .as_deref()
            .map(Quality::from_label)
            .filter(|q| *q != Quality::Unknown)
            .unwrap_or_else(|| Quality::from_url(&url));
        let display_name = match quality {
            Quality::Unknown => source_name.to_string(),
            q => format!("{source_name} {}", q.label()),
        };

        let link = PlayableLink::new(source_name, url, container)
            .with_display_name(display_name)
            .with_quality(quality);
        extraction
            .links
            .push(with_playback_headers(link, embed_url, user_agent));
    }

    extraction
}

/// The `{...}` around a match, or as much of it as exists.
fn enclosing_object(script: &str, start: usize, end: usize) -> &str {
    let open = script[..start].rfind('{').map_or(0, |i| i + 1);
    let close = script[end..].find('}').map_or(script.len(), |i| end + i);
    &script[open..close]
}

fn is_subtitle(url: &str, kind: Option<&str>) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    (path.ends_with(".vtt") && kind != Some("thumbnails"))
        || path.ends_with(".srt")
        || matches!(kind, Some("captions" | "subtitles"))
}
