//! Data models shared by the crawler, the summarizer and the notifier.
//!
//! - [`Source`]: one configured origin of articles, tagged with a [`SourceKind`]
//! - [`Article`]: a normalized candidate produced by a fetcher
//! - [`DigestInput`]: the deduplicated article list of a single run
//! - [`DigestEvent`]: one ranked item of the LLM's digest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How articles are discovered for a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RSS, Atom or JSON Feed document.
    #[default]
    Rss,
    /// XML sitemap or sitemap index, optionally with Google News fields.
    Sitemap,
    /// Listing page plus one fetch per linked article.
    Web,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Rss => "rss",
            SourceKind::Sitemap => "sitemap",
            SourceKind::Web => "web",
        };
        f.write_str(name)
    }
}

fn default_category() -> String {
    "tech".to_string()
}

/// A configured news source. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    #[serde(default = "default_category")]
    pub category: String,
    /// CSS selector for article links on a `web` listing page.
    #[serde(default)]
    pub article_selector: Option<String>,
    /// Per-source override of `max_articles_per_source`.
    #[serde(default)]
    pub max_articles: Option<usize>,
}

impl Source {
    /// The article cap for this source, falling back to the global default.
    pub fn article_limit(&self, default_limit: usize) -> usize {
        self.max_articles.unwrap_or(default_limit)
    }
}

/// A normalized article candidate.
///
/// `published_at` is `None` when the source exposes no usable timestamp;
/// such articles are kept by the time-window filter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub category: String,
    pub body_text: Option<String>,
}

impl Article {
    /// Publish time as RFC 3339, or `"unknown"`.
    pub fn published_label(&self) -> String {
        self.published_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Snapshot of the crawl handed to the summarizer, written as JSON on request.
#[derive(Debug, Deserialize, Serialize)]
pub struct DigestInput {
    pub generated_at: DateTime<Utc>,
    pub lookback_hours: u32,
    pub articles: Vec<Article>,
}

/// One event picked by the LLM.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DigestEvent {
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: String,
}
