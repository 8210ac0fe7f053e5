//! Embed-host extractors.
//!
//! Each registered host is one [`Extractor`]: a static descriptor (name,
//! domains) plus the [`ExtractorKind`] that knows how its embed page hides
//! the stream. The set of kinds is closed; supporting a new host means
//! registering a descriptor with an existing kind.
//!
//! An extractor either finishes with links ([`Step::Done`]) or points at
//! the next URL to dispatch ([`Step::Follow`]); the registry drives the
//! chain so no extractor recurses into another.

pub mod delegate;
pub mod direct;
pub mod generic;
pub mod packed;
pub mod token;

use tracing::debug;
use url::Url;

use crate::error::{ExtractError, Result};
use crate::http_client::{FetchRequest, FetchResponse, Fetcher};
use crate::link::{Extraction, PlayableLink};

/// Static description of one embed host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorDescriptor {
    /// Short lowercase name, also used as a link's source name.
    pub name: &'static str,
    /// Host fragments this extractor claims (substring match on the host).
    pub match_domains: &'static [&'static str],
    /// The host refuses the embed page without a Referer.
    pub requires_referer: bool,
}

/// How an embed page hides its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    /// `eval(function(p,a,c,k,e,d)...)` player config.
    PackedScript,
    /// Plain `<video src>` or `<video><source src>`.
    DirectMediaTag,
    /// Wrapper page whose iframe points at the real host.
    Delegating,
    /// Base64 token standing in for the embed URL.
    EncodedToken,
    /// Unknown host: try the common patterns.
    Generic,
}

/// Where to go after a delegating or token extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub url: String,
    pub referer: Option<String>,
    /// Nested iframe targets must match a registered host; decoded tokens
    /// may still fall back to the generic extractor.
    pub nested: bool,
}

/// Outcome of one extractor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done(Extraction),
    Follow(Hop),
}

/// A registered host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub descriptor: ExtractorDescriptor,
    pub kind: ExtractorKind,
    /// Domains added from configuration on top of the descriptor's.
    pub extra_domains: Vec<String>,
}

impl Extractor {
    #[must_use]
    pub const fn new(descriptor: ExtractorDescriptor, kind: ExtractorKind) -> Self {
        Self {
            descriptor,
            kind,
            extra_domains: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// True if `host` contains one of this extractor's domains.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        self.descriptor
            .match_domains
            .iter()
            .copied()
            .chain(self.extra_domains.iter().map(String::as_str))
            .any(|domain| host.contains(domain))
    }

    /// Run this extractor on `input`, an embed URL or, for
    /// [`ExtractorKind::EncodedToken`], the raw token.
    pub async fn resolve(
        &self,
        fetcher: &dyn Fetcher,
        input: &str,
        referer: Option<&str>,
    ) -> Result<Step> {
        debug!(extractor = self.name(), kind = ?self.kind, input, "Running extractor");
        match self.kind {
            ExtractorKind::PackedScript => packed::resolve(&self.descriptor, fetcher, input, referer)
                .await
                .map(Step::Done),
            ExtractorKind::DirectMediaTag => direct::resolve(&self.descriptor, fetcher, input, referer)
                .await
                .map(Step::Done),
            ExtractorKind::Delegating => delegate::resolve(&self.descriptor, fetcher, input, referer)
                .await
                .map(Step::Follow),
            ExtractorKind::EncodedToken => token::resolve(input, referer).map(Step::Follow),
            ExtractorKind::Generic => generic::resolve(&self.descriptor, fetcher, input, referer)
                .await
                .map(Step::Done),
        }
    }
}

/// Fetch an embed page. Transport errors and non-2xx statuses are
/// [`ExtractError::Unreachable`].
pub(crate) async fn fetch_embed(
    descriptor: &ExtractorDescriptor,
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<FetchResponse> {
    let referer = if descriptor.requires_referer {
        referer.map(str::to_string).or_else(|| origin_of(url))
    } else {
        None
    };
    let request = FetchRequest::get(url).with_referer(referer.as_deref());

    let response = fetcher
        .fetch(&request)
        .await
        .map_err(|e| ExtractError::unreachable(url, format!("{e:#}")))?;

    if !response.is_success() {
        return Err(ExtractError::unreachable(url, format!("HTTP {}", response.status)));
    }
    Ok(response)
}

/// `scheme://host[:port]/` of `url`.
pub(crate) fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}/", parsed.scheme()),
        None => format!("{}://{host}/", parsed.scheme()),
    })
}

/// Lowercased host of `url`.
pub(crate) fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)
}

/// Resolve `target` (absolute, protocol-relative or relative) against `base`.
pub(crate) fn absolutize(base: &str, target: &str) -> Option<String> {
    let target = crate::link::normalize_url(target);
    if crate::link::has_http_scheme(&target) {
        return Some(target);
    }
    let joined = Url::parse(base).ok()?.join(&target).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Headers every link from `embed_url` needs: the host's origin as
/// Referer, and the fetcher's User-Agent when it has a fixed one.
pub(crate) fn with_playback_headers(
    link: PlayableLink,
    embed_url: &str,
    user_agent: Option<&str>,
) -> PlayableLink {
    let link = match origin_of(embed_url) {
        Some(origin) => link.with_referer(origin),
        None => link,
    };
    match user_agent {
        Some(ua) => link.with_header("User-Agent", ua),
        None => link,
    }
}
