//! Shared HTTP client for all fetchers.
//!
//! One `reqwest::Client` is built per run with the identifying user agent and
//! the per-request timeout. Every GET is a single attempt; a non-success
//! status is reported as [`FetchError::Status`].

use crate::config::CrawlerSettings;
use crate::error::FetchError;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.7"));

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_settings(settings: &CrawlerSettings) -> Result<Self, FetchError> {
        Self::new(
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout.max(1)),
        )
    }

    /// GET a URL and return the raw body.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.bytes().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body.to_vec())
    }

    /// GET a URL and decode the body as text, honoring the response charset.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body)
    }
}
