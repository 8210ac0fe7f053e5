//! Browser profiles for embed-host requests.
//!
//! Embed hosts serve the player page only to something that looks like a
//! browser, and their CDNs often pin playback to the same User-Agent. The
//! profile chosen here is therefore also what extractors copy into a
//! link's required headers.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT,
};

/// Browser profile sent as default headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
}

const CHROME_VERSIONS: &[&str] = &["131.0.0.0", "130.0.0.0", "129.0.0.0", "128.0.0.0"];

const FIREFOX_VERSIONS: &[&str] = &["133.0", "132.0", "131.0"];

const SAFARI_VERSIONS: &[(&str, &str)] = &[("17.6", "605.1.15"), ("17.5", "605.1.15")];

/// The target sites are Arabic-first; a plain en-US browser stands out.
const ACCEPT_LANGUAGES: &[&str] = &[
    "ar,en-US;q=0.9,en;q=0.8",
    "ar-EG,ar;q=0.9,en-US;q=0.8,en;q=0.7",
    "ar-SA,ar;q=0.9,en;q=0.8",
    "en-US,en;q=0.9,ar;q=0.8",
];

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

#[derive(Debug, Clone, Copy)]
enum Platform {
    Windows,
    MacOS,
    Linux,
}

impl Platform {
    fn random() -> Self {
        let roll: f32 = rand::thread_rng().gen();
        if roll < 0.7 {
            Platform::Windows
        } else if roll < 0.9 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::Linux => "X11; Linux x86_64",
        }
    }
}

fn pick<'a>(items: &[&'a str]) -> &'a str {
    items.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn random_accept_language() -> String {
    pick(ACCEPT_LANGUAGES).to_string()
}

#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let user_agent = format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        Platform::random().os_string(),
        pick(CHROME_VERSIONS)
    );

    BrowserProfile {
        user_agent,
        accept: HTML_ACCEPT.to_string(),
        accept_language: random_accept_language(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
    }
}

#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let version = pick(FIREFOX_VERSIONS);
    let user_agent = format!(
        "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
        Platform::random().os_string(),
    );

    BrowserProfile {
        user_agent,
        accept: HTML_ACCEPT.to_string(),
        accept_language: random_accept_language(),
        accept_encoding: "gzip, deflate, br, zstd".to_string(),
    }
}

#[must_use]
pub fn safari_profile() -> BrowserProfile {
    let (version, webkit) = SAFARI_VERSIONS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(("17.6", "605.1.15"));

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/{webkit} (KHTML, like Gecko) Version/{version} Safari/{webkit}"
        ),
        accept: HTML_ACCEPT.to_string(),
        accept_language: random_accept_language(),
        // Safari doesn't advertise zstd
        accept_encoding: "gzip, deflate, br".to_string(),
    }
}

/// Random profile weighted roughly by market share.
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let roll: f32 = rand::thread_rng().gen();
    if roll < 0.7 {
        chrome_profile()
    } else if roll < 0.85 {
        safari_profile()
    } else {
        firefox_profile()
    }
}

impl BrowserProfile {
    /// Replace the User-Agent, keeping the other headers.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Convert profile to reqwest `HeaderMap`.
    ///
    /// Fails only for a configured User-Agent that isn't a valid header value.
    pub fn to_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .with_context(|| format!("invalid User-Agent {:?}", self.user_agent))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_str(&self.accept)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&self.accept_language)?);
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_str(&self.accept_encoding)?);
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        Ok(headers)
    }
}
