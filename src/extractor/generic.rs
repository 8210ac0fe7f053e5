//! Fallback for hosts nobody registered.
//!
//! Tries the packed player first, then a plain player config in the page
//! itself (`file:"..."` or `sources:["..."]`), then a bare `<video>` tag.

use std::sync::LazyLock;

use regex::Regex;

use super::{absolutize, direct, fetch_embed, packed, with_playback_headers, ExtractorDescriptor};
use crate::error::{ExtractError, Result};
use crate::http_client::Fetcher;
use crate::link::{ContainerHint, Extraction, PlayableLink, Quality};
use crate::unpack;

// `sources: ["https://.../master.m3u8", ...]`
static SOURCES_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsources\s*:\s*\[\s*["']([^"']+)["']"#).expect("static regex")
});

pub(crate) async fn resolve(
    descriptor: &ExtractorDescriptor,
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<Extraction> {
    let page = fetch_embed(descriptor, fetcher, url, referer).await?;
    extract_from_page(descriptor.name, &page.body, url, fetcher.user_agent())
}

pub(crate) fn extract_from_page(
    source_name: &str,
    html: &str,
    embed_url: &str,
    user_agent: Option<&str>,
) -> Result<Extraction> {
    if unpack::detect(html) {
        if let Ok(extraction) = packed::extract_from_page(source_name, html, embed_url, user_agent) {
            return Ok(extraction);
        }
    }

    let mut extraction = packed::player_config_links(source_name, html, embed_url, user_agent);
    if extraction.is_empty() {
        if let Some(link) = sources_list_link(source_name, html, embed_url, user_agent) {
            extraction.links.push(link);
        }
    }
    if !extraction.is_empty() {
        return Ok(extraction);
    }

    direct::extract_from_page(source_name, html, embed_url, user_agent)
        .map_err(|_| ExtractError::Unsupported(format!("{embed_url}: no known player pattern")))
}

fn sources_list_link(
    source_name: &str,
    html: &str,
    embed_url: &str,
    user_agent: Option<&str>,
) -> Option<PlayableLink> {
    let raw = SOURCES_LIST.captures(html)?.get(1)?.as_str();
    let url = absolutize(embed_url, raw)?;
    let container = ContainerHint::from_url(&url);
    if !container.is_known() {
        return None;
    }
    let quality = Quality::from_url(&url);
    let link = PlayableLink::new(source_name, url, container).with_quality(quality);
    Some(with_playback_headers(link, embed_url, user_agent))
}
