//! Hosts that serve a plain `<video>` element.

use scraper::{Html, Selector};

use super::{absolutize, fetch_embed, with_playback_headers, ExtractorDescriptor};
use crate::error::{ExtractError, Result};
use crate::http_client::Fetcher;
use crate::link::{ContainerHint, Extraction, PlayableLink, Quality, SubtitleFile};

pub(crate) async fn resolve(
    descriptor: &ExtractorDescriptor,
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<Extraction> {
    let page = fetch_embed(descriptor, fetcher, url, referer).await?;
    extract_from_page(descriptor.name, &page.body, url, fetcher.user_agent())
}

/// First `video[src]` or `video source[src]` with a recognizable container,
/// plus any `video track` subtitles.
pub(crate) fn extract_from_page(
    source_name: &str,
    html: &str,
    embed_url: &str,
    user_agent: Option<&str>,
) -> Result<Extraction> {
    let document = Html::parse_document(html);
    let mut extraction = Extraction::default();

    if let Some((url, container, label)) = find_video_source(&document, embed_url) {
        let quality = label
            .as_deref()
            .map(Quality::from_label)
            .filter(|q| *q != Quality::Unknown)
            .unwrap_or_else(|| Quality::from_url(&url));
        let link = PlayableLink::new(source_name, url, container).with_quality(quality);
        extraction
            .links
            .push(with_playback_headers(link, embed_url, user_agent));
    }

    if extraction.links.is_empty() {
        return Err(ExtractError::NotFound(format!("{embed_url}: no video element")));
    }

    extraction.subtitles = find_tracks(&document, embed_url);
    Ok(extraction)
}

fn find_video_source(document: &Html, embed_url: &str) -> Option<(String, ContainerHint, Option<String>)> {
    let (Ok(video_selector), Ok(source_selector)) =
        (Selector::parse("video[src]"), Selector::parse("video source[src]"))
    else {
        return None;
    };

    let candidates = document
        .select(&video_selector)
        .chain(document.select(&source_selector));

    for element in candidates {
        let el = element.value();
        let Some(url) = el.attr("src").and_then(|src| absolutize(embed_url, src)) else {
            continue;
        };
        let container = match ContainerHint::from_url(&url) {
            ContainerHint::Unknown => el.attr("type").map_or(ContainerHint::Unknown, ContainerHint::from_mime),
            known => known,
        };
        if container.is_known() {
            let label = el
                .attr("label")
                .or_else(|| el.attr("size"))
                .or_else(|| el.attr("res"))
                .map(str::to_string);
            return Some((url, container, label));
        }
    }
    None
}

fn find_tracks(document: &Html, embed_url: &str) -> Vec<SubtitleFile> {
    let Ok(selector) = Selector::parse("video track[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|track| {
            !matches!(track.value().attr("kind"), Some("thumbnails" | "chapters" | "metadata"))
        })
        .filter_map(|track| {
            let el = track.value();
            let url = absolutize(embed_url, el.attr("src")?)?;
            let language = el
                .attr("label")
                .or_else(|| el.attr("srclang"))
                .unwrap_or("Unknown")
                .to_string();
            Some(SubtitleFile { url, language })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMBED: &str = "https://sendvid.com/embed/xyz";

    #[test]
    fn video_src_attribute() {
        let html = r#"<html><body><video id="v" src="https://cdn.example/v.mp4" controls></video></body></html>"#;
        let extraction = extract_from_page("sendvid", html, EMBED, None).unwrap();
        assert_eq!(extraction.links.len(), 1);
        assert_eq!(extraction.links[0].url(), "https://cdn.example/v.mp4");
        assert_eq!(extraction.links[0].container(), ContainerHint::Mp4);
        assert_eq!(extraction.links[0].referer(), Some("https://sendvid.com/"));
    }

    #[test]
    fn source_child_with_mime_type() {
        let html = r#"<video><source src="/stream/play?id=9" type="application/x-mpegURL" label="720p"><track kind="captions" src="/subs/ar.vtt" srclang="ar" label="العربية"></video>"#;
        let extraction = extract_from_page("vidoza", html, "https://vidoza.net/embed-9.html", None).unwrap();
        let link = &extraction.links[0];
        assert_eq!(link.url(), "https://vidoza.net/stream/play?id=9");
        assert_eq!(link.container(), ContainerHint::Hls);
        assert_eq!(link.quality(), Quality::HD);
        assert_eq!(extraction.subtitles[0].language, "العربية");
        assert_eq!(extraction.subtitles[0].url, "https://vidoza.net/subs/ar.vtt");
    }

    #[test]
    fn no_video_tag_is_not_found() {
        let err = extract_from_page("sendvid", "<html><p>removed</p></html>", EMBED, None).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }

    #[test]
    fn unrecognized_container_is_not_emitted() {
        let html = r#"<video src="blob:https://sendvid.com/123"></video>"#;
        assert!(extract_from_page("sendvid", html, EMBED, None).is_err());
    }
}
