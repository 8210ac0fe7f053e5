//! Header side channel for URLs.
//!
//! Some consumers only accept a URL string. Required request headers ride
//! along in a fragment: `<url>#headers=<percent-encoded JSON object>`.
//! Fragments never reach the server, so the media URL itself is untouched.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

/// Fragment marker preceding the encoded header map.
pub const HEADERS_MARKER: &str = "#headers=";

/// Attach `headers` to `url`. An empty map returns `url` unchanged.
#[must_use]
pub fn encode(url: &str, headers: &BTreeMap<String, String>) -> String {
    if headers.is_empty() {
        return url.to_string();
    }
    // BTreeMap<String, String> always serializes
    let json = serde_json::to_string(headers).unwrap_or_default();
    format!("{url}{HEADERS_MARKER}{}", urlencoding::encode(&json))
}

/// Split an [`encode`]d string back into URL and headers.
///
/// Strings without the marker decode to themselves and an empty map.
pub fn decode(encoded: &str) -> Result<(String, BTreeMap<String, String>)> {
    let Some(pos) = encoded.rfind(HEADERS_MARKER) else {
        return Ok((encoded.to_string(), BTreeMap::new()));
    };

    let (url, fragment) = encoded.split_at(pos);
    let payload = &fragment[HEADERS_MARKER.len()..];
    let json = urlencoding::decode(payload).context("header fragment is not valid UTF-8")?;
    let headers: BTreeMap<String, String> =
        serde_json::from_str(&json).context("header fragment is not a JSON object of strings")?;

    Ok((url.to_string(), headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_headers_leave_url_untouched() {
        let url = "https://cdn.example/video.m3u8?token=abc";
        assert_eq!(encode(url, &BTreeMap::new()), url);
    }

    #[test]
    fn round_trip_with_awkward_values() {
        let url = "https://cdn.example/hls/master.m3u8?t=1&s=2";
        let headers = map(&[
            ("Referer", "https://vidbom.com/embed-x.html#player"),
            ("User-Agent", "Mozilla/5.0 \"quoted\" a=b&c=d"),
            ("x-Custom-CASE", "100% #1 & 'single'"),
        ]);

        let encoded = encode(url, &headers);
        assert!(encoded.starts_with(url));
        assert_eq!(encoded.matches('#').count(), 1);

        let (decoded_url, decoded_headers) = decode(&encoded).unwrap();
        assert_eq!(decoded_url, url);
        assert_eq!(decoded_headers, headers);
    }

    #[test]
    fn round_trip_keeps_existing_fragment() {
        let url = "https://cdn.example/v.mp4#t=30";
        let headers = map(&[("Referer", "https://sendvid.com/")]);
        let (decoded_url, decoded_headers) = decode(&encode(url, &headers)).unwrap();
        assert_eq!(decoded_url, url);
        assert_eq!(decoded_headers, headers);
    }

    #[test]
    fn decode_without_marker() {
        let (url, headers) = decode("https://cdn.example/v.mp4").unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4");
        assert!(headers.is_empty());
    }

    #[test]
    fn decode_rejects_garbage_payload() {
        assert!(decode("https://cdn.example/v.mp4#headers=%7Bnot-json").is_err());
    }

    #[test]
    fn round_trip_many_maps() {
        let values = ["", "#", "&", "\"", "=", "a#b&c=\"d\"", "عربي", "%20"];
        for (i, value) in values.iter().enumerate() {
            let headers = map(&[("Referer", value), ("X-Index", &i.to_string())]);
            let url = format!("https://cdn.example/{i}.m3u8");
            assert_eq!(decode(&encode(&url, &headers)).unwrap(), (url, headers));
        }
    }
}
