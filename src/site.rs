//! Host-facing entry point: one content page in, links out through a sink.
//!
//! Where a site lists its servers is plain data ([`ServerSelector`]s);
//! everything after that is shared.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use crate::extractor::absolutize;
use crate::http_client::FetchRequest;
use crate::link::{has_http_scheme, PlayableLink, ServerReference, SubtitleFile};
use crate::orchestrator::LinkResolver;

/// Receives results for the host application.
pub trait LinkSink: Send {
    fn on_link(&mut self, link: PlayableLink);

    fn on_subtitle(&mut self, subtitle: SubtitleFile);
}

/// A sink that just keeps everything.
#[derive(Debug, Clone, Default)]
pub struct CollectedLinks {
    pub links: Vec<PlayableLink>,
    pub subtitles: Vec<SubtitleFile>,
}

impl LinkSink for CollectedLinks {
    fn on_link(&mut self, link: PlayableLink) {
        self.links.push(link);
    }

    fn on_subtitle(&mut self, subtitle: SubtitleFile) {
        self.subtitles.push(subtitle);
    }
}

/// Where on a content page a server reference lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSelector {
    /// CSS selector for the carrying element.
    pub css: String,
    /// Attribute holding the URL or token.
    pub attr: String,
}

impl ServerSelector {
    pub fn new(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: attr.into(),
        }
    }

    /// Server-list conventions common to the supported sites.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("[data-link]", "data-link"),
            Self::new("[data-url]", "data-url"),
            Self::new("[data-embed]", "data-embed"),
            Self::new("li[data-src]", "data-src"),
            Self::new("iframe[src]", "src"),
        ]
    }
}

/// Scrape server references from a content page, in selector order then
/// document order, without duplicates.
///
/// Invalid selectors are skipped with a warning.
pub fn scrape_server_references(
    html: &str,
    base_url: &str,
    selectors: &[ServerSelector],
) -> Vec<ServerReference> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for server in selectors {
        let Ok(selector) = Selector::parse(&server.css) else {
            warn!(css = %server.css, "Invalid server selector");
            continue;
        };
        for element in document.select(&selector) {
            let Some(raw) = element.value().attr(&server.attr) else {
                continue;
            };
            if let Some(reference) = classify(raw, base_url) {
                if seen.insert(reference.clone()) {
                    references.push(reference);
                }
            }
        }
    }
    references
}

fn classify(raw: &str, base_url: &str) -> Option<ServerReference> {
    let raw = raw.trim();
    if raw.starts_with('/') && !raw.starts_with("//") {
        return absolutize(base_url, raw).map(ServerReference::Url);
    }
    // Base64 never contains ':', so `about:blank` and friends are not tokens
    if raw.contains(':') && !has_http_scheme(raw) {
        return None;
    }
    ServerReference::parse(raw)
}

/// One content site wired to the shared pipeline.
#[derive(Debug, Clone)]
pub struct ContentSite {
    pub name: String,
    pub selectors: Vec<ServerSelector>,
    resolver: LinkResolver,
}

impl ContentSite {
    pub fn new(name: impl Into<String>, resolver: LinkResolver) -> Self {
        Self {
            name: name.into(),
            selectors: ServerSelector::defaults(),
            resolver,
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: Vec<ServerSelector>) -> Self {
        self.selectors = selectors;
        self
    }

    /// Resolve every server on `page_url` and hand the results to `sink`.
    ///
    /// Returns `false` only when the page itself couldn't be fetched; a page
    /// whose servers all fail still counts as an attempt.
    #[instrument(skip(self, sink), fields(site = %self.name))]
    pub async fn resolve_links_for_page(&self, page_url: &str, sink: &mut dyn LinkSink) -> bool {
        let request = FetchRequest::get(page_url);
        let page = match self.resolver.fetcher().fetch(&request).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                warn!(status = page.status, "Content page returned an error status");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Content page fetch failed");
                return false;
            }
        };

        let references = scrape_server_references(&page.body, &page.final_url, &self.selectors);
        debug!(count = references.len(), "Scraped server references");

        let (extraction, _) = self
            .resolver
            .resolve_all_with_report(&references, Some(page_url))
            .await;

        for link in extraction.links {
            sink.on_link(link);
        }
        for subtitle in extraction.subtitles {
            sink.on_subtitle(subtitle);
        }
        true
    }
}
