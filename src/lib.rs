//! `mashahid` - link resolution for Arabic streaming-site plugins
//!
//! # Pipeline
//!
//! - **Scrape**: server references from a content page ([`site`])
//! - **Dispatch**: each reference to the extractor for its host ([`registry`])
//! - **Extract**: unpack, decode or follow until a media URL turns up ([`extractor`], [`unpack`])
//! - **Deliver**: playable links with the headers they need ([`link`], [`headers`])
//!
//! References are resolved concurrently and independently ([`orchestrator`]):
//! a dead server only costs its own links.
//!
//! # Example
//!
//! ```rust,no_run
//! use mashahid::{CollectedLinks, ContentSite, LinkResolver, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::load()?;
//!     let site = ContentSite::new("example", LinkResolver::from_config(&config)?);
//!
//!     let mut sink = CollectedLinks::default();
//!     site.resolve_links_for_page("https://site.example/watch/ep-1", &mut sink).await;
//!     for link in &sink.links {
//!         println!("{} {}", link.display_name(), link.playback_url());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod headers;
pub mod http_client;
pub mod link;
pub mod orchestrator;
pub mod registry;
pub mod site;
pub mod unpack;

pub use config::ResolverConfig;
pub use error::{ErrorKind, ExtractError};
pub use extractor::{Extractor, ExtractorDescriptor, ExtractorKind};
pub use fingerprint::{chrome_profile, firefox_profile, random_profile, safari_profile, BrowserProfile};
pub use http_client::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use link::{ContainerHint, Extraction, PlayableLink, Quality, ServerReference, SubtitleFile};
pub use orchestrator::{LinkResolver, ResolutionReport};
pub use registry::ExtractorRegistry;
pub use site::{scrape_server_references, CollectedLinks, ContentSite, LinkSink, ServerSelector};

/// Version of mashahid
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a compact stderr subscriber for hosts without their own.
///
/// `RUST_LOG` overrides `default_directive` (e.g. `"mashahid=info"`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
