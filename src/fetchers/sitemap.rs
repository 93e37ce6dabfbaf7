//! XML sitemap strategy, including Google News sitemaps.
//!
//! # Discovery
//!
//! The configured URL may be a `<urlset>` or a `<sitemapindex>`; an index is
//! expanded into at most [`MAX_CHILD_SITEMAPS`] child sitemaps in document
//! order. Elements are matched by local name, so namespace prefixes
//! (`news:`, `sm:`) do not matter.
//!
//! # Titles
//!
//! Plain sitemaps carry no titles. After the window filter and cap are
//! applied, each remaining untitled entry gets one lightweight page fetch
//! that reads only `<title>`; if that fails, the URL slug is used.

use super::Fetch;
use crate::error::FetchError;
use crate::extract::page_title;
use crate::http::HttpClient;
use crate::models::{Article, Source};
use crate::utils::{collapse_whitespace, parse_timestamp, title_from_url};
use crate::window::{self, WindowPlan};
use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;
use std::borrow::Cow;
use tracing::{debug, info, instrument, warn};

/// Upper bound on child sitemaps fetched from one index.
pub const MAX_CHILD_SITEMAPS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
struct SitemapEntry {
    loc: String,
    lastmod: Option<String>,
    news_publication_date: Option<String>,
    news_title: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SitemapDoc {
    Index(Vec<String>),
    UrlSet(Vec<SitemapEntry>),
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn unescaped(raw: &str) -> String {
    let text = quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw));
    collapse_whitespace(&text)
}

/// Parse a `<urlset>` or `<sitemapindex>` document.
fn parse_sitemap(xml: &str) -> Result<SitemapDoc, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut is_index = false;
    let mut child_sitemaps = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<SitemapEntry> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                if stack.is_empty() && name == "sitemapindex" {
                    is_index = true;
                }
                if name == "url" {
                    current = Some(SitemapEntry::default());
                }
                stack.push(name);
                text.clear();
            }
            Event::Text(t) => text.push_str(&String::from_utf8_lossy(&t)),
            Event::CData(c) => {
                let raw = String::from_utf8_lossy(&c);
                text.push_str(&quick_xml::escape::escape(&*raw));
            }
            Event::GeneralRef(r) => {
                text.push('&');
                text.push_str(&String::from_utf8_lossy(&r));
                text.push(';');
            }
            Event::End(e) => {
                let name = local_name(e.local_name().as_ref());
                stack.pop();
                let parent = stack.last().map(String::as_str);
                let value = unescaped(&text);
                text.clear();

                match (name.as_str(), parent) {
                    ("loc", Some("sitemap")) if !value.is_empty() => child_sitemaps.push(value),
                    ("loc", Some("url")) => {
                        if let Some(entry) = current.as_mut() {
                            entry.loc = value;
                        }
                    }
                    ("lastmod", Some("url")) => {
                        if let Some(entry) = current.as_mut() {
                            entry.lastmod = Some(value);
                        }
                    }
                    ("publication_date", _) => {
                        if let Some(entry) = current.as_mut() {
                            entry.news_publication_date = Some(value);
                        }
                    }
                    ("title", Some("news")) => {
                        if let Some(entry) = current.as_mut() {
                            entry.news_title = Some(value).filter(|t| !t.is_empty());
                        }
                    }
                    ("url", _) => {
                        if let Some(entry) = current.take().filter(|e| !e.loc.is_empty()) {
                            entries.push(entry);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapDoc::Index(child_sitemaps))
    } else {
        Ok(SitemapDoc::UrlSet(entries))
    }
}

impl SitemapEntry {
    /// News publication date wins over `lastmod`.
    fn into_article(self, source: &Source) -> Article {
        let published_at = self
            .news_publication_date
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.lastmod.as_deref().and_then(parse_timestamp));

        Article {
            title: self.news_title.unwrap_or_default(),
            url: self.loc,
            published_at,
            source_name: source.name.clone(),
            category: source.category.clone(),
            body_text: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SitemapFetcher {
    http: HttpClient,
}

impl SitemapFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn load(&self, url: &str) -> Result<SitemapDoc, FetchError> {
        let xml = self.http.get_text(url).await?;
        parse_sitemap(&xml)
    }

    /// Collect `<url>` entries, expanding one level of sitemap index.
    async fn entries(&self, source: &Source) -> Result<Vec<SitemapEntry>, FetchError> {
        let children = match self.load(&source.url).await? {
            SitemapDoc::UrlSet(entries) => return Ok(entries),
            SitemapDoc::Index(children) => children,
        };
        info!(children = children.len(), "Expanding sitemap index");

        let mut entries = Vec::new();
        for child in children.iter().take(MAX_CHILD_SITEMAPS) {
            match self.load(child).await {
                Ok(SitemapDoc::UrlSet(found)) => {
                    debug!(%child, count = found.len(), "Parsed child sitemap");
                    entries.extend(found);
                }
                Ok(SitemapDoc::Index(_)) => {
                    warn!(%child, "Nested sitemap index skipped");
                }
                Err(e) => {
                    warn!(%child, error = %e, "Child sitemap failed; skipping");
                }
            }
        }
        Ok(entries)
    }

    /// `<title>` of the page, or the URL slug when the lookup fails.
    async fn resolve_title(&self, url: &str) -> String {
        match self.http.get_text(url).await {
            Ok(html) => {
                if let Some(title) = page_title(&Html::parse_document(&html)) {
                    return title;
                }
                debug!(%url, "Page has no title; using URL slug");
            }
            Err(e) => {
                warn!(%url, error = %e, "Title lookup failed; using URL slug");
            }
        }
        title_from_url(url).unwrap_or_else(|| url.to_string())
    }
}

impl Fetch for SitemapFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &Source, plan: &WindowPlan) -> Result<Vec<Article>, FetchError> {
        let entries = self.entries(source).await?;
        let total = entries.len();

        let candidates: Vec<Article> = entries
            .into_iter()
            .map(|entry| entry.into_article(source))
            .collect();
        let selected = window::select(candidates, plan);

        let articles: Vec<Article> = stream::iter(selected)
            .then(|mut article| async move {
                if article.title.is_empty() {
                    article.title = self.resolve_title(&article.url).await;
                }
                article
            })
            .collect()
            .await;

        info!(entries = total, kept = articles.len(), "Parsed sitemap");
        Ok(articles)
    }
}
