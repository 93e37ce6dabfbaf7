//! Merge per-source article lists into the run's digest input.
//!
//! Sources are concatenated in configured order and deduplicated by
//! normalized URL; the first occurrence wins.

use crate::models::Article;
use itertools::Itertools;
use tracing::debug;
use url::Url;

/// Query parameters that only carry tracking information.
const TRACKING_PARAMS: &[&str] = &[
    "utm", "gclid", "fbclid", "yclid", "mc_cid", "mc_eid", "_ga", "ref_src",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonical form of a URL used as the dedup key.
///
/// Scheme folded to `https`, host lowercased without `www.`, default port,
/// fragment and tracking parameters removed, trailing slash stripped.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_ascii_lowercase();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return url.to_string();
    }

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
        .unwrap_or_default();

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut().extend_pairs(kept);
    }
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    let port = match url.port() {
        Some(p) if p != 443 && p != 80 => format!(":{p}"),
        _ => String::new(),
    };
    let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();

    format!("https://{host}{port}{path}{query}")
}

/// Concatenate per-source lists in order and drop later duplicates.
pub fn merge(per_source: Vec<Vec<Article>>) -> Vec<Article> {
    let total: usize = per_source.iter().map(Vec::len).sum();
    let merged: Vec<Article> = per_source
        .into_iter()
        .flatten()
        .unique_by(|a| normalize_url(&a.url))
        .collect();
    debug!(
        total,
        kept = merged.len(),
        dropped = total - merged.len(),
        "Merged source results"
    );
    merged
}
