//! Crawl every configured source and produce the digest input.
//!
//! Sources are fetched a few at a time. Each future carries its source's
//! position, and its result is written into that slot, so the merged output
//! follows the order of the sources file no matter which fetch finishes
//! first. A failed source contributes nothing and never stops the others.

use crate::aggregate;
use crate::config::{CrawlerSettings, SourceRegistry};
use crate::error::FetchError;
use crate::fetchers::Fetchers;
use crate::http::HttpClient;
use crate::models::Article;
use crate::window::{self, WindowPlan};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Crawl all sources in `registry` relative to `now`.
///
/// Returns `Err` only when the shared HTTP client cannot be built.
#[instrument(level = "info", skip_all, fields(sources = registry.len()))]
pub async fn crawl_all(
    registry: &SourceRegistry,
    settings: &CrawlerSettings,
    now: DateTime<Utc>,
) -> Result<Vec<Article>, FetchError> {
    let http = HttpClient::from_settings(settings)?;
    let fetchers = Fetchers::new(http, settings);
    Ok(crawl_with(&fetchers, registry, settings, now).await)
}

async fn crawl_with(
    fetchers: &Fetchers,
    registry: &SourceRegistry,
    settings: &CrawlerSettings,
    now: DateTime<Utc>,
) -> Vec<Article> {
    if registry.is_empty() {
        warn!("Source registry is empty; nothing to crawl");
        return Vec::new();
    }

    let t0 = Instant::now();
    let concurrency = settings.max_concurrent_sources.max(1);
    info!(
        lookback_hours = settings.lookback_hours,
        concurrency,
        "Crawling sources"
    );

    let mut slots: Vec<Vec<Article>> = vec![Vec::new(); registry.len()];
    let mut failed = 0usize;

    let mut results = stream::iter(registry.sources().iter().enumerate())
        .map(|(index, source)| async move {
            let plan = WindowPlan::new(
                now,
                settings.lookback_hours,
                source.article_limit(settings.max_articles_per_source),
            );
            let source_t0 = Instant::now();
            let result = fetchers
                .fetch(source, &plan)
                .await
                .map(|candidates| (candidates.len(), window::select(candidates, &plan)));
            (index, source, result, source_t0.elapsed())
        })
        .buffer_unordered(concurrency);

    while let Some((index, source, result, elapsed)) = results.next().await {
        match result {
            Ok((candidates, kept)) => {
                info!(
                    source = %source.name,
                    kind = %source.kind,
                    candidates,
                    kept = kept.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Source crawled"
                );
                slots[index] = kept;
            }
            Err(e) => {
                failed += 1;
                warn!(
                    source = %source.name,
                    url = %source.url,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Source failed; skipping"
                );
            }
        }
    }

    let before_dedup: usize = slots.iter().map(Vec::len).sum();
    let articles = aggregate::merge(slots);
    info!(
        sources = registry.len(),
        failed,
        collected = before_dedup,
        unique = articles.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Crawl finished"
    );
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::test_support::source;
    use crate::models::{Source, SourceKind};
    use chrono::Duration;
    use mockito::Server;
    use std::time::Duration as StdDuration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings() -> CrawlerSettings {
        CrawlerSettings {
            request_timeout: 5,
            user_agent: "TechDigestTest/1.0".to_string(),
            ..CrawlerSettings::default()
        }
    }

    fn rss(items: &[(&str, &str, DateTime<Utc>)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, at)| {
                format!(
                    "<item><title>{title}</title><link>{link}</link><pubDate>{}</pubDate></item>",
                    at.to_rfc2822()
                )
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>{body}</channel></rss>"#)
    }

    fn named(name: &str, kind: SourceKind, url: String) -> Source {
        Source {
            name: name.to_string(),
            ..source(kind, url)
        }
    }

    #[tokio::test]
    async fn test_crawl_applies_window_and_cap() {
        let now = Utc::now();
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body(rss(&[
                ("Old", "https://a.example.com/old", now - Duration::hours(30)),
                ("One", "https://a.example.com/one", now - Duration::hours(1)),
                ("Two", "https://a.example.com/two", now - Duration::hours(2)),
                ("Three", "https://a.example.com/three", now - Duration::hours(3)),
            ]))
            .create_async()
            .await;

        let mut src = named("Alpha", SourceKind::Rss, format!("{}/feed", server.url()));
        src.max_articles = Some(2);
        let registry = SourceRegistry::new(vec![src]).unwrap();

        let articles = crawl_all(&registry, &settings(), now).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_others() {
        let now = Utc::now();
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body(rss(&[("Fresh", "https://b.example.com/fresh", now - Duration::hours(2))]))
            .create_async()
            .await;

        let registry = SourceRegistry::new(vec![
            named("Down", SourceKind::Rss, "http://127.0.0.1:9/feed".to_string()),
            named("Up", SourceKind::Rss, format!("{}/feed", server.url())),
        ])
        .unwrap();

        let articles = crawl_all(&registry, &settings(), now).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source_name, "Up");
    }

    #[tokio::test]
    async fn test_timed_out_source_is_skipped() {
        let now = Utc::now();
        // accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stalled = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body(rss(&[("Fresh", "https://c.example.com/fresh", now - Duration::hours(1))]))
            .create_async()
            .await;

        let registry = SourceRegistry::new(vec![
            named("Stalled", SourceKind::Rss, format!("http://{stalled}/feed")),
            named("Up", SourceKind::Rss, format!("{}/feed", server.url())),
        ])
        .unwrap();
        let settings = CrawlerSettings {
            request_timeout: 1,
            ..settings()
        };

        let articles = tokio::time::timeout(StdDuration::from_secs(10), crawl_all(&registry, &settings, now))
            .await
            .expect("crawl should finish once the stalled request times out")
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source_name, "Up");
    }

    #[tokio::test]
    async fn test_output_follows_source_order_not_completion_order() {
        let now = Utc::now();
        let slow_body = rss(&[("Slow story", "https://slow.example.com/story", now - Duration::hours(1))]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let slow = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let body = slow_body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = sock.read(&mut buf).await;
                    tokio::time::sleep(StdDuration::from_millis(500)).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        let mut server = Server::new_async().await;
        let _fast = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body(rss(&[("Fast story", "https://fast.example.com/story", now - Duration::hours(1))]))
            .create_async()
            .await;

        let registry = SourceRegistry::new(vec![
            named("Slow", SourceKind::Rss, format!("http://{slow}/feed")),
            named("Fast", SourceKind::Rss, format!("{}/feed", server.url())),
        ])
        .unwrap();
        let settings = CrawlerSettings {
            max_concurrent_sources: 2,
            ..settings()
        };

        let articles = crawl_all(&registry, &settings, now).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Slow story", "Fast story"]);
        assert_eq!(articles[0].source_name, "Slow");
    }

    #[tokio::test]
    async fn test_duplicates_across_sources_keep_first_source() {
        let now = Utc::now();
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/first")
            .with_status(200)
            .with_body(rss(&[
                ("Shared story", "https://news.example.com/story?utm_source=rss", now - Duration::hours(1)),
                ("Only first", "https://news.example.com/only-first", now - Duration::hours(2)),
            ]))
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/second")
            .with_status(200)
            .with_body(rss(&[
                ("Shared again", "https://www.news.example.com/story/", now - Duration::hours(1)),
                ("Only second", "https://news.example.com/only-second", now - Duration::hours(3)),
            ]))
            .create_async()
            .await;

        let registry = SourceRegistry::new(vec![
            named("First", SourceKind::Rss, format!("{}/first", server.url())),
            named("Second", SourceKind::Rss, format!("{}/second", server.url())),
        ])
        .unwrap();

        let articles = crawl_all(&registry, &settings(), now).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Shared story", "Only first", "Only second"]);
        assert_eq!(articles[0].source_name, "First");
    }

    #[tokio::test]
    async fn test_empty_registry_yields_nothing() {
        let registry = SourceRegistry::new(Vec::new()).unwrap();
        let articles = crawl_all(&registry, &settings(), Utc::now()).await.unwrap();
        assert!(articles.is_empty());
    }
}
