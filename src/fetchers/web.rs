//! Generic web page strategy.
//!
//! Follows the same two-phase pattern as a site-specific scraper:
//!
//! 1. **Indexing**: fetch the listing page and extract candidate article
//!    links with the configured selector (or the heuristics in
//!    [`crate::extract::listing_links`]).
//! 2. **Fetching**: fetch at most `max_articles` candidates, a few at a time,
//!    and extract title, body text and publish time from each page.
//!
//! A failed article fetch drops that article only.

use super::Fetch;
use crate::error::FetchError;
use crate::extract::{self, ListingLink};
use crate::http::HttpClient;
use crate::models::{Article, Source};
use crate::utils::title_from_url;
use crate::window::WindowPlan;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct WebFetcher {
    http: HttpClient,
    max_content_chars: usize,
    max_concurrent_pages: usize,
}

impl WebFetcher {
    pub fn new(http: HttpClient, max_content_chars: usize, max_concurrent_pages: usize) -> Self {
        Self {
            http,
            max_content_chars,
            max_concurrent_pages: max_concurrent_pages.max(1),
        }
    }

    /// Fetch the listing page and extract candidate links.
    async fn index_articles(&self, source: &Source) -> Result<Vec<ListingLink>, FetchError> {
        let base = Url::parse(&source.url)?;
        let selector = source
            .article_selector
            .as_deref()
            .map(|css| Selector::parse(css).map_err(|e| FetchError::Selector(e.to_string())))
            .transpose()?;

        let html = self.http.get_text(&source.url).await?;
        let document = Html::parse_document(&html);
        let links = extract::listing_links(&document, &base, selector.as_ref());

        info!(
            count = links.len(),
            selector = source.article_selector.as_deref().unwrap_or("<heuristic>"),
            "Indexed listing page"
        );
        debug!(urls = ?links.iter().map(|l| &l.url).collect::<Vec<_>>(), "Candidate links");
        Ok(links)
    }

    /// Fetch one article page and run the extraction heuristics.
    #[instrument(level = "debug", skip_all, fields(url = %link.url))]
    async fn fetch_article(&self, link: &ListingLink, source: &Source) -> Result<Article, FetchError> {
        let html = self.http.get_text(&link.url).await?;
        Ok(self.parse_article(&html, link, source))
    }

    fn parse_article(&self, html: &str, link: &ListingLink, source: &Source) -> Article {
        let document = Html::parse_document(html);

        let title = extract::article_title(&document)
            .or_else(|| Some(link.text.clone()).filter(|t| !t.is_empty()))
            .or_else(|| title_from_url(&link.url))
            .unwrap_or_else(|| link.url.clone());
        let body = extract::main_text(&document, self.max_content_chars);

        Article {
            title,
            url: link.url.clone(),
            published_at: extract::published_at(&document, &link.url),
            source_name: source.name.clone(),
            category: source.category.clone(),
            body_text: Some(body).filter(|b| !b.is_empty()),
        }
    }
}

impl Fetch for WebFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &Source, plan: &WindowPlan) -> Result<Vec<Article>, FetchError> {
        let links = self.index_articles(source).await?;
        let to_check = plan.max_articles.min(links.len());

        let results: Vec<Option<Article>> = stream::iter(links.into_iter().take(to_check))
            .map(|link| async move {
                match self.fetch_article(&link, source).await {
                    Ok(article) => {
                        debug!(url = %article.url, title = %article.title, "Fetched article");
                        Some(article)
                    }
                    Err(e) => {
                        warn!(url = %link.url, error = %e, "Article fetch failed; skipping");
                        None
                    }
                }
            })
            .buffered(self.max_concurrent_pages)
            .collect()
            .await;

        let articles: Vec<Article> = results.into_iter().flatten().collect();
        let undated = articles.iter().filter(|a| a.published_at.is_none()).count();
        info!(checked = to_check, fetched = articles.len(), undated, "Fetched web articles");
        Ok(articles)
    }
}
