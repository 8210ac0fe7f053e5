//! Fetch collaborator.
//!
//! Extractors never own an HTTP client. They receive a `&dyn Fetcher` for
//! the duration of one resolution, so session state (cookies, anti-bot
//! clearance) lives with whoever constructed the fetcher and is never
//! global.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::fingerprint::{random_profile, BrowserProfile};

/// One GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub referer: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_referer(mut self, referer: Option<&str>) -> Self {
        self.referer = referer.map(str::to_string);
        self
    }
}

/// Response as seen by extractors: status, post-redirect URL, decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic HTTP GET with text body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Transport failures are errors; HTTP error
    /// statuses are returned as responses.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;

    /// User-Agent the fetcher presents, if fixed. Links resolved through
    /// this fetcher carry it so playback matches the scraping client.
    fn user_agent(&self) -> Option<&str> {
        None
    }
}

/// reqwest-backed fetcher with a browser profile and cookie jar.
pub struct HttpFetcher {
    client: Client,
    profile: BrowserProfile,
}

impl HttpFetcher {
    /// Fetcher with default config and a random browser profile.
    pub fn new() -> Result<Self> {
        Self::with_config(&ResolverConfig::default())
    }

    /// Fetcher honoring timeouts, redirect limit and User-Agent override.
    pub fn with_config(config: &ResolverConfig) -> Result<Self> {
        let mut profile = random_profile();
        if let Some(user_agent) = &config.user_agent {
            profile = profile.with_user_agent(user_agent.clone());
        }
        Self::with_profile(profile, config)
    }

    pub fn with_profile(profile: BrowserProfile, config: &ResolverConfig) -> Result<Self> {
        let headers = profile.to_headers()?;

        let client = Client::builder()
            // Embed hosts are a mixed bag, let the server negotiate
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            // Some hosts set a session cookie on the embed page and check it on the manifest
            .cookie_store(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, profile })
    }

    #[must_use]
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.get(&request.url);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        debug!(
            status = %status,
            version = ?response.version(),
            final_url = %final_url,
            "Response received"
        );

        let body = response.text().await?;
        Ok(FetchResponse {
            status: status.as_u16(),
            final_url,
            body,
        })
    }

    fn user_agent(&self) -> Option<&str> {
        Some(&self.profile.user_agent)
    }
}
