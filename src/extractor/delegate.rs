//! Wrapper pages that only frame another host.

use scraper::{Html, Selector};

use super::{absolutize, fetch_embed, ExtractorDescriptor, Hop};
use crate::error::{ExtractError, Result};
use crate::http_client::Fetcher;

pub(crate) async fn resolve(
    descriptor: &ExtractorDescriptor,
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<Hop> {
    let page = fetch_embed(descriptor, fetcher, url, referer).await?;
    let target = inner_frame(&page.body, url)
        .ok_or_else(|| ExtractError::NotFound(format!("{url}: no iframe to follow")))?;

    Ok(Hop {
        url: target,
        referer: Some(url.to_string()),
        nested: true,
    })
}

/// First iframe target on the page, absolute.
pub(crate) fn inner_frame(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    [
        ("iframe[src]", "src"),
        ("iframe[data-src]", "data-src"),
        ("iframe[data-lazy-src]", "data-lazy-src"),
    ]
    .into_iter()
    .filter_map(|(css, attr)| Selector::parse(css).ok().map(|sel| (sel, attr)))
    .find_map(|(selector, attr)| {
        document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(|src| absolutize(base_url, src).filter(|u| u != base_url))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_relative_iframe() {
        let html = r#"<div class="player"><iframe src="//govid.me/embed-77.html" allowfullscreen></iframe></div>"#;
        assert_eq!(
            inner_frame(html, "https://reviewrate.net/v/77").as_deref(),
            Some("https://govid.me/embed-77.html")
        );
    }

    #[test]
    fn lazy_iframe_attribute() {
        let html = r#"<iframe src="about:blank" data-src="https://vidshar.tv/embed-1.html"></iframe>"#;
        assert_eq!(
            inner_frame(html, "https://reviewrate.net/v/1").as_deref(),
            Some("https://vidshar.tv/embed-1.html")
        );
    }

    #[test]
    fn self_reference_is_ignored() {
        let html = r#"<iframe src="https://reviewrate.net/v/1"></iframe>"#;
        assert_eq!(inner_frame(html, "https://reviewrate.net/v/1"), None);
    }

    #[test]
    fn no_iframe() {
        assert_eq!(inner_frame("<p>gone</p>", "https://reviewrate.net/v/1"), None);
    }
}
