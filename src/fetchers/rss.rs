//! RSS / Atom feed strategy.
//!
//! The feed is fetched once and parsed with `feed-rs`, which handles RSS
//! 0.9x–2.0, Atom and JSON Feed. Every entry with a usable link becomes a
//! candidate; window filtering and capping happen in the crawler.

use super::Fetch;
use crate::error::FetchError;
use crate::extract::html_to_text;
use crate::http::HttpClient;
use crate::models::{Article, Source};
use crate::utils::{collapse_whitespace, title_from_url};
use crate::window::WindowPlan;
use feed_rs::model::Entry;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct RssFetcher {
    http: HttpClient,
    max_content_chars: usize,
}

impl RssFetcher {
    pub fn new(http: HttpClient, max_content_chars: usize) -> Self {
        Self {
            http,
            max_content_chars,
        }
    }

    fn to_article(&self, entry: Entry, source: &Source, base: &Url) -> Option<Article> {
        let link = entry_link(&entry)?;
        let url = base.join(&link).map(|u| u.to_string()).unwrap_or(link);

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&html_to_text(&t.content, usize::MAX)))
            .filter(|t| !t.is_empty())
            .or_else(|| title_from_url(&url))
            .unwrap_or_else(|| url.clone());

        let raw_summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let body_text = Some(html_to_text(&raw_summary, self.max_content_chars))
            .filter(|s| !s.is_empty());

        Some(Article {
            title,
            url,
            published_at: entry.published.or(entry.updated),
            source_name: source.name.clone(),
            category: source.category.clone(),
            body_text,
        })
    }
}

/// First alternate (or rel-less) link, then any link, then an http(s) id.
fn entry_link(entry: &Entry) -> Option<String> {
    let alternate = entry.links.iter().find(|l| {
        !l.href.trim().is_empty()
            && l.rel
                .as_deref()
                .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| entry.links.iter().find(|l| !l.href.trim().is_empty())) {
        return Some(link.href.trim().to_string());
    }

    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        Some(id.to_string())
    } else {
        None
    }
}

impl Fetch for RssFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &Source, _plan: &WindowPlan) -> Result<Vec<Article>, FetchError> {
        let base = Url::parse(&source.url)?;
        let body = self.http.get_bytes(&source.url).await?;
        let feed = feed_rs::parser::parse(&body[..]).map_err(|e| FetchError::Feed(e.to_string()))?;

        let total = feed.entries.len();
        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.to_article(entry, source, &base))
            .collect();

        debug!(urls = ?articles.iter().map(|a| &a.url).collect::<Vec<_>>(), "Feed entries");
        info!(entries = total, usable = articles.len(), "Parsed feed");
        Ok(articles)
    }
}
