//! Extractor registry and dispatch.
//!
//! Routing for a server reference:
//!
//! 1. Tokens go to the Base64 extractor, which decodes them to a URL.
//! 2. URLs that already point at `.m3u8`/`.mp4` are emitted as-is.
//! 3. Hosts in the bypass table (redirector domains serving a known
//!    host's player) route to that host's extractor.
//! 4. Registered extractors in registration order; first domain match wins.
//! 5. The generic extractor, for top-level references only. An iframe found
//!    inside a wrapper page must land on a registered host.
//!
//! Routing depends only on the reference, so it is deterministic.

use tracing::{debug, instrument, warn};

use crate::config::ResolverConfig;
use crate::error::{ExtractError, Result};
use crate::extractor::{host_of, Extractor, ExtractorDescriptor, ExtractorKind, Step};
use crate::http_client::Fetcher;
use crate::link::{ContainerHint, Extraction, PlayableLink, Quality, ServerReference};

/// Wrapper pages and decoded tokens followed before giving up.
pub const MAX_HOPS: usize = 4;

/// Source name for links taken straight from a reference.
pub const DIRECT_SOURCE: &str = "direct";

// ═══════════════════════════════════════════════════════════════════════════
// Packed player hosts
// ═══════════════════════════════════════════════════════════════════════════

const VIDBOM: ExtractorDescriptor = ExtractorDescriptor {
    name: "vidbom",
    match_domains: &["vidbom.com", "vidbm.com", "vedbom.com"],
    requires_referer: false,
};

const GOVID: ExtractorDescriptor = ExtractorDescriptor {
    name: "govid",
    match_domains: &["govid.me", "govid.co"],
    requires_referer: true,
};

const VIDSHAR: ExtractorDescriptor = ExtractorDescriptor {
    name: "vidshar",
    match_domains: &["vidshar.tv", "viidshar.com"],
    requires_referer: false,
};

const FILEMOON: ExtractorDescriptor = ExtractorDescriptor {
    name: "filemoon",
    match_domains: &["filemoon.sx", "filemoon.in", "filemoon.to"],
    requires_referer: false,
};

const STREAMWISH: ExtractorDescriptor = ExtractorDescriptor {
    name: "streamwish",
    match_domains: &["streamwish.to", "wishembed.pro", "swdyu.com"],
    requires_referer: true,
};

const VIDHIDE: ExtractorDescriptor = ExtractorDescriptor {
    name: "vidhide",
    match_domains: &["vidhidepro.com", "vidhide.com"],
    requires_referer: false,
};

// ═══════════════════════════════════════════════════════════════════════════
// Plain <video> hosts
// ═══════════════════════════════════════════════════════════════════════════

const SENDVID: ExtractorDescriptor = ExtractorDescriptor {
    name: "sendvid",
    match_domains: &["sendvid.com"],
    requires_referer: false,
};

const VIDOZA: ExtractorDescriptor = ExtractorDescriptor {
    name: "vidoza",
    match_domains: &["vidoza.net", "videzz.net"],
    requires_referer: false,
};

// ═══════════════════════════════════════════════════════════════════════════
// Wrappers, tokens, fallback
// ═══════════════════════════════════════════════════════════════════════════

const REVIEWRATE: ExtractorDescriptor = ExtractorDescriptor {
    name: "reviewrate",
    match_domains: &["reviewrate.net"],
    requires_referer: true,
};

const BASE64: ExtractorDescriptor = ExtractorDescriptor {
    name: "base64",
    match_domains: &[],
    requires_referer: false,
};

const GENERIC: ExtractorDescriptor = ExtractorDescriptor {
    name: "generic",
    match_domains: &[],
    requires_referer: true,
};

/// Redirector domain → extractor that understands its player.
const BYPASS: &[(&str, &str)] = &[("reviewtech.me", "vidshar"), ("vdbtm.shop", "vidbom")];

/// Routes server references to extractors and drives hop chains.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    extractors: Vec<Extractor>,
    bypass: &'static [(&'static str, &'static str)],
    token: Extractor,
    generic: Extractor,
}

impl ExtractorRegistry {
    /// Registry with every built-in extractor.
    #[must_use]
    pub fn new() -> Self {
        let extractors = vec![
            Extractor::new(VIDBOM, ExtractorKind::PackedScript),
            Extractor::new(GOVID, ExtractorKind::PackedScript),
            Extractor::new(VIDSHAR, ExtractorKind::PackedScript),
            Extractor::new(FILEMOON, ExtractorKind::PackedScript),
            Extractor::new(STREAMWISH, ExtractorKind::PackedScript),
            Extractor::new(VIDHIDE, ExtractorKind::PackedScript),
            Extractor::new(SENDVID, ExtractorKind::DirectMediaTag),
            Extractor::new(VIDOZA, ExtractorKind::DirectMediaTag),
            Extractor::new(REVIEWRATE, ExtractorKind::Delegating),
        ];

        Self {
            extractors,
            bypass: BYPASS,
            token: Extractor::new(BASE64, ExtractorKind::EncodedToken),
            generic: Extractor::new(GENERIC, ExtractorKind::Generic),
        }
    }

    /// Built-ins plus the configured extra domains.
    #[must_use]
    pub fn with_config(config: &ResolverConfig) -> Self {
        let mut registry = Self::new();
        for (name, domains) in &config.extra_domains {
            match registry.extractors.iter_mut().find(|e| e.name() == name) {
                Some(extractor) => extractor
                    .extra_domains
                    .extend(domains.iter().map(|d| d.trim().to_ascii_lowercase())),
                None => warn!(extractor = %name, "extra_domains names an unknown extractor"),
            }
        }
        registry
    }

    /// Registered host extractors, in match order.
    #[must_use]
    pub fn extractors(&self) -> &[Extractor] {
        &self.extractors
    }

    /// Name of the extractor a reference is routed to first.
    ///
    /// `None` for URLs without a host.
    #[must_use]
    pub fn select(&self, reference: &ServerReference) -> Option<&'static str> {
        match reference {
            ServerReference::Token(_) => Some(self.token.name()),
            ServerReference::Url(url) if is_direct_media(url) => Some(DIRECT_SOURCE),
            ServerReference::Url(url) => self.match_url(url, true).map(Extractor::name),
        }
    }

    /// Extractor for `url`: bypass table, then registered domains, then
    /// (if allowed) the generic fallback.
    #[must_use]
    pub fn match_url(&self, url: &str, allow_generic: bool) -> Option<&Extractor> {
        let host = host_of(url)?;

        if let Some((_, target)) = self.bypass.iter().find(|(domain, _)| host.contains(domain)) {
            if let Some(extractor) = self.extractors.iter().find(|e| e.name() == *target) {
                debug!(host = %host, extractor = target, "Bypass domain");
                return Some(extractor);
            }
        }

        self.extractors
            .iter()
            .find(|e| e.matches_host(&host))
            .or_else(|| allow_generic.then_some(&self.generic))
    }

    /// Resolve one server reference to its links.
    ///
    /// Never returns an empty [`Extraction`]: "nothing found" is
    /// [`ExtractError::NotFound`].
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn resolve_server(
        &self,
        fetcher: &dyn Fetcher,
        reference: &ServerReference,
        referer: Option<&str>,
    ) -> Result<Extraction> {
        let (mut extractor, mut input) = match reference {
            ServerReference::Token(token) => (&self.token, token.clone()),
            ServerReference::Url(url) if is_direct_media(url) => {
                return Ok(direct_media(url, referer));
            }
            ServerReference::Url(url) => {
                let extractor = self
                    .match_url(url, true)
                    .ok_or_else(|| ExtractError::Unsupported(format!("not a routable URL: {url}")))?;
                (extractor, url.clone())
            }
        };
        let mut referer = referer.map(str::to_string);

        for hop in 0..=MAX_HOPS {
            debug!(extractor = extractor.name(), hop, "Dispatching");
            let next = match extractor.resolve(fetcher, &input, referer.as_deref()).await? {
                Step::Done(extraction) if extraction.is_empty() => {
                    return Err(ExtractError::NotFound(format!("{}: no links", extractor.name())));
                }
                Step::Done(extraction) => return Ok(extraction),
                Step::Follow(next) => next,
            };

            if is_direct_media(&next.url) {
                return Ok(direct_media(&next.url, next.referer.as_deref()));
            }
            extractor = self.match_url(&next.url, !next.nested).ok_or_else(|| {
                ExtractError::Unsupported(format!("no extractor for {}", next.url))
            })?;
            input = next.url;
            referer = next.referer;
        }

        Err(ExtractError::Unsupported(format!(
            "gave up after {MAX_HOPS} hops at {input}"
        )))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_direct_media(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    path.ends_with(".m3u8") || path.ends_with(".mp4")
}

fn direct_media(url: &str, referer: Option<&str>) -> Extraction {
    let link = PlayableLink::new(DIRECT_SOURCE, url, ContainerHint::from_url(url))
        .with_quality(Quality::from_url(url));
    let link = match referer {
        Some(referer) => link.with_referer(referer),
        None => link,
    };
    Extraction {
        links: vec![link],
        subtitles: Vec::new(),
    }
}
