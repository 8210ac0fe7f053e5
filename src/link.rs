//! Values flowing through the pipeline: server references in, playable links out.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::headers;

/// One candidate video source scraped from a content page.
///
/// Either a URL to an embed page or an opaque token that decodes to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerReference {
    Url(String),
    Token(String),
}

impl ServerReference {
    /// Classify a raw scraped value. Returns `None` for blank input.
    ///
    /// Protocol-relative URLs get `https:` and HTML-escaped ampersands are
    /// undone, so structurally equal references dedupe.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("//") {
            return Some(Self::Url(normalize_url(&format!("https:{raw}"))));
        }
        if has_http_scheme(raw) {
            return Some(Self::Url(normalize_url(raw)));
        }
        Some(Self::Token(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Token(s) => s,
        }
    }
}

impl fmt::Display for ServerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Token(token) => write!(f, "token:{token}"),
        }
    }
}

pub(crate) fn normalize_url(url: &str) -> String {
    let url = url.trim().replace("&amp;", "&").replace("\\/", "/");
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }
    match url.split_once("://") {
        Some((scheme, rest)) if is_http(scheme) => format!("{}://{rest}", scheme.to_ascii_lowercase()),
        _ => url,
    }
}

/// `http://` or `https://`, in any case.
pub(crate) fn has_http_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| is_http(scheme))
}

fn is_http(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Stream container, as far as it can be told from the URL or MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerHint {
    #[default]
    Unknown,
    Hls,
    Mp4,
}

impl ContainerHint {
    /// Classify by substring: `.m3u8` means HLS, `.mp4` means MP4.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains(".m3u8") {
            Self::Hls
        } else if lower.contains(".mp4") {
            Self::Mp4
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/x-mpegurl" | "application/vnd.apple.mpegurl" | "audio/mpegurl" => {
                Self::Hls
            }
            "video/mp4" => Self::Mp4,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

/// Vertical resolution bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Quality {
    #[default]
    Unknown,
    /// 360p and below
    Low,
    SD,
    HD,
    FHD,
    /// 1440p and above
    UHD,
}

static HEIGHT_IN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{3,4})\s*p?\b").expect("static regex"));

// `_720p.`, `/1080/`, `-480p-`
static HEIGHT_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[_\-/.](\d{3,4})p?[_\-/.]").expect("static regex"));

impl Quality {
    #[must_use]
    pub fn from_height(height: u32) -> Self {
        match height {
            0 => Self::Unknown,
            1..=360 => Self::Low,
            361..=480 => Self::SD,
            481..=720 => Self::HD,
            721..=1080 => Self::FHD,
            _ => Self::UHD,
        }
    }

    /// Parse a player label such as `"720p"`, `"1080"`, `"HD"` or `"FHD"`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if let Some(height) = HEIGHT_IN_LABEL
            .captures(label)
            .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        {
            return Self::from_height(height);
        }
        match label.trim().to_ascii_uppercase().as_str() {
            "4K" | "UHD" => Self::UHD,
            "FHD" | "FULLHD" | "FULL HD" => Self::FHD,
            "HD" => Self::HD,
            "SD" => Self::SD,
            "LOW" | "LQ" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Best-effort guess from resolution markers in a media URL.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        HEIGHT_IN_URL
            .captures_iter(url)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .find(|h| [144, 240, 360, 480, 540, 720, 1080, 1440, 2160].contains(h))
            .map_or(Self::Unknown, Self::from_height)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Low => "360p",
            Self::SD => "480p",
            Self::HD => "720p",
            Self::FHD => "1080p",
            Self::UHD => "4K",
        }
    }
}

/// Resolved, directly fetchable media URL plus what the fetch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableLink {
    source_name: String,
    display_name: String,
    url: String,
    referer: Option<String>,
    required_headers: BTreeMap<String, String>,
    quality: Quality,
    container: ContainerHint,
}

impl PlayableLink {
    pub fn new(source_name: impl Into<String>, url: impl Into<String>, container: ContainerHint) -> Self {
        let source_name = source_name.into();
        Self {
            display_name: source_name.clone(),
            source_name,
            url: url.into(),
            referer: None,
            required_headers: BTreeMap::new(),
            quality: Quality::Unknown,
            container,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the referer and mirror it into the required headers.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        let referer = referer.into();
        self.required_headers.insert("Referer".to_string(), referer.clone());
        self.referer = Some(referer);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.required_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn required_headers(&self) -> &BTreeMap<String, String> {
        &self.required_headers
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn container(&self) -> ContainerHint {
        self.container
    }

    /// URL with required headers carried in the `#headers=` fragment, for
    /// players that can't take headers separately.
    pub fn playback_url(&self) -> String {
        headers::encode(&self.url, &self.required_headers)
    }
}

/// Subtitle track found beside a player's sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubtitleFile {
    pub url: String,
    pub language: String,
}

/// Everything one server reference yielded, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub links: Vec<PlayableLink>,
    pub subtitles: Vec<SubtitleFile>,
}

impl Extraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
