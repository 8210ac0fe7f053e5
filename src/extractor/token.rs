//! Base64 tokens standing in for embed URLs.
//!
//! Some content sites put `btoa(url)` or `btoa('<iframe src="...">')` in the
//! server list instead of the URL itself.

use std::sync::LazyLock;

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;

use super::Hop;
use crate::error::{ExtractError, Result};
use crate::link::{has_http_scheme, normalize_url};

static IFRAME_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)src\s*=\s*["']([^"']+)["']"#).expect("static regex"));

pub(crate) fn resolve(token: &str, referer: Option<&str>) -> Result<Hop> {
    let url = decode_token(token)?;
    Ok(Hop {
        url,
        referer: referer.map(str::to_string),
        nested: false,
    })
}

/// Decode a token to the embed URL it hides.
///
/// Standard and URL-safe alphabets are accepted, padded or not.
pub fn decode_token(token: &str) -> Result<String> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ExtractError::Malformed("empty token".into()));
    }

    let bytes = [
        &general_purpose::STANDARD,
        &general_purpose::STANDARD_NO_PAD,
        &general_purpose::URL_SAFE,
        &general_purpose::URL_SAFE_NO_PAD,
    ]
    .into_iter()
    .find_map(|engine| engine.decode(compact.as_bytes()).ok())
    .ok_or_else(|| ExtractError::Malformed(format!("token is not base64: {}", preview(&compact))))?;

    let text = String::from_utf8(bytes)
        .map_err(|_| ExtractError::Malformed(format!("token is not UTF-8: {}", preview(&compact))))?;
    let text = text.trim();

    let candidate = if text.to_ascii_lowercase().contains("<iframe") {
        IFRAME_SRC
            .captures(text)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| ExtractError::Malformed("iframe in token has no src".into()))?
    } else {
        text.to_string()
    };

    let url = normalize_url(&candidate);
    if has_http_scheme(&url) {
        Ok(url)
    } else {
        Err(ExtractError::Malformed(format!("token does not decode to a URL: {}", preview(&url))))
    }
}

fn preview(s: &str) -> String {
    s.chars().take(40).collect()
}
