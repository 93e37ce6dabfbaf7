//! Utility functions for timestamps, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Lenient timestamp parsing for feeds, sitemaps and HTML metadata
//! - Date and title heuristics derived from article URLs
//! - String truncation and whitespace cleanup for article text and logs
//! - JSON error detection for handling LLM response truncation
//! - File system validation for output directories

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument, warn};
use url::Url;

static DATE_IN_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(\d{4})[/-](\d{2})[/-](\d{2})(?:/|$)|/(\d{4})(\d{2})(\d{2})(?:/|$)")
        .expect("valid date-in-url regex")
});

/// Parse a timestamp in any of the formats seen in feeds, sitemaps and HTML.
///
/// Accepts RFC 3339, RFC 2822, W3C datetime variants (date only, minutes
/// with offset, trailing `Z`) and naive `YYYY-MM-DD HH:MM:SS`. Timestamps
/// without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned = match s.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => s.to_string(),
    };
    for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Extract a publication date from the URL path (`/2025/02/21/`, `/2025-02-21/`, `/20250221/`).
pub fn date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let caps = DATE_IN_URL.captures(&path)?;

    let (y, m, d) = if caps.get(1).is_some() {
        (&caps[1], &caps[2], &caps[3])
    } else {
        (&caps[4], &caps[5], &caps[6])
    };
    let date = NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Derive a human-readable title from the URL slug.
///
/// Uses the last path segment containing a letter, percent-decoded, with the
/// file extension dropped and `-`/`_` turned into spaces.
pub fn title_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| s.chars().any(|c| c.is_alphabetic()))
        .last()?;

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let stem = match decoded.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 5 => stem.to_string(),
        _ => decoded,
    };

    let words = collapse_whitespace(&stem.replace(['-', '_', '+'], " "));
    if words.is_empty() {
        None
    } else {
        Some(upcase(&words))
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let head = truncate_chars(s, max);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let check_path = format!("{}/.tech_digest_write_check", path.trim_end_matches('/'));
    match stdfs::File::create(&check_path) {
        Ok(_) => {
            if let Err(e) = stdfs::remove_file(&check_path) {
                warn!(path = %check_path, error = %e, "Failed to remove write check file");
            }
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 2, 21, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-02-21T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-02-21T16:30:00+08:00"), Some(expected));
        assert_eq!(parse_timestamp("Fri, 21 Feb 2025 08:30:00 GMT"), Some(expected));
        assert_eq!(parse_timestamp("2025-02-21T08:30Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-02-21 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-02-21T08:30:00.000"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let expected = Utc.with_ymd_and_hms(2025, 2, 21, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-02-21"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_date_from_url() {
        let expected = Utc.with_ymd_and_hms(2025, 2, 21, 0, 0, 0).unwrap();
        assert_eq!(date_from_url("https://x.com/2025/02/21/big-news"), Some(expected));
        assert_eq!(date_from_url("https://x.com/news/2025-02-21/big-news"), Some(expected));
        assert_eq!(date_from_url("https://x.com/20250221/big-news"), Some(expected));
        assert_eq!(date_from_url("https://x.com/news/big-news"), None);
        assert_eq!(date_from_url("https://x.com/2025/13/45/bad"), None);
    }

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url("https://x.com/2025/02/21/openai-ships-new-model.html"),
            Some("Openai ships new model".to_string())
        );
        assert_eq!(
            title_from_url("https://x.com/blog/rust_2024_edition/12345"),
            Some("Rust 2024 edition".to_string())
        );
        assert_eq!(
            title_from_url("https://x.com/caf%C3%A9-news/"),
            Some("Café news".to_string())
        );
        assert_eq!(title_from_url("https://x.com/"), None);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("hello"), "Hello");
        assert_eq!(upcase(""), "");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"[{"rank": 1, "title": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        assert!(looks_truncated(&result.unwrap_err()));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_leaves_dir_clean() {
        let dir = std::env::temp_dir().join(format!("tech_digest_writable_{}", std::process::id()));
        let nested = dir.join("json");
        let path = nested.to_string_lossy().to_string();

        ensure_writable_dir(&path).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(stdfs::read_dir(&nested).unwrap().count(), 0);

        // a second call on an existing directory still succeeds
        ensure_writable_dir(&format!("{path}/")).await.unwrap();
        assert_eq!(stdfs::read_dir(&nested).unwrap().count(), 0);

        stdfs::remove_dir_all(&dir).unwrap();
    }
}
