//! URL and input validation utilities

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];
const SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"))
}

fn list_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

/// Parse a user supplied URL, assuming `https` when the scheme is missing
pub fn normalize_url(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(parsed),
        _ => None,
    }
}

/// Check whether a URL points at a YouTube video, short, embed or playlist
pub fn is_valid_youtube_url(input: &str) -> bool {
    let Some(url) = normalize_url(input) else {
        return false;
    };
    let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) else {
        return false;
    };

    if SHORT_HOSTS.contains(&host.as_str()) {
        return url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(|id| video_id_pattern().is_match(id))
            .unwrap_or(false);
    }

    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return false;
    }

    let query_value = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(id) = query_value("v") {
        if video_id_pattern().is_match(&id) {
            return true;
        }
    }
    if let Some(list) = query_value("list") {
        if list_id_pattern().is_match(&list) {
            return true;
        }
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [kind, id, ..] if matches!(*kind, "embed" | "shorts" | "v" | "live") => {
            video_id_pattern().is_match(id)
        }
        _ => false,
    }
}

/// Interpret a checkbox-like form value
pub fn parse_form_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}
