//! Fetch strategies, one per discovery type.
//!
//! Each strategy turns a [`Source`] into article candidates:
//!
//! | Type | Module | Discovery | Extra requests |
//! |------|--------|-----------|----------------|
//! | `rss` | [`rss`] | RSS / Atom / JSON Feed entries | none |
//! | `sitemap` | [`sitemap`] | `<url>` entries, sitemap indexes expanded | one `<title>` lookup per untitled article |
//! | `web` | [`web`] | links on a listing page | one per article, up to `max_articles` |
//!
//! A strategy returns `Err` only when the source as a whole failed; the
//! crawler logs it and the source contributes nothing. Per-article failures
//! inside a strategy are logged and skipped there.

use crate::config::CrawlerSettings;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::models::{Article, Source, SourceKind};
use crate::window::WindowPlan;

pub mod rss;
pub mod sitemap;
pub mod web;

pub use rss::RssFetcher;
pub use sitemap::SitemapFetcher;
pub use web::WebFetcher;

/// Capability shared by all discovery strategies.
pub trait Fetch {
    /// Fetch candidates for `source`. `plan` carries the lookback window and
    /// the effective per-source cap so expensive follow-up requests can be
    /// limited to articles that will actually be kept.
    async fn fetch(&self, source: &Source, plan: &WindowPlan) -> Result<Vec<Article>, FetchError>;
}

/// The strategy set, selected per source by its declared type.
#[derive(Debug, Clone)]
pub struct Fetchers {
    rss: RssFetcher,
    sitemap: SitemapFetcher,
    web: WebFetcher,
}

impl Fetchers {
    pub fn new(http: HttpClient, settings: &CrawlerSettings) -> Self {
        Self {
            rss: RssFetcher::new(http.clone(), settings.max_content_chars),
            sitemap: SitemapFetcher::new(http.clone()),
            web: WebFetcher::new(http, settings.max_content_chars, settings.max_concurrent_pages),
        }
    }

    pub async fn fetch(&self, source: &Source, plan: &WindowPlan) -> Result<Vec<Article>, FetchError> {
        match source.kind {
            SourceKind::Rss => self.rss.fetch(source, plan).await,
            SourceKind::Sitemap => self.sitemap.fetch(source, plan).await,
            SourceKind::Web => self.web.fetch(source, plan).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::http::HttpClient;
    use crate::models::{Source, SourceKind};
    use std::time::Duration;

    pub fn http() -> HttpClient {
        HttpClient::new("TechDigestTest/1.0", Duration::from_secs(5)).unwrap()
    }

    pub fn source(kind: SourceKind, url: String) -> Source {
        Source {
            name: format!("{kind} source"),
            url,
            kind,
            category: "tech".to_string(),
            article_selector: None,
            max_articles: None,
        }
    }
}
