//! Deliver the digest as a LINE push message.
//!
//! The message is plain text: a dated header, one block per event, and a
//! footer with per-source article counts for the run. LINE rejects text
//! messages over 5000 characters, so longer digests are cut.

use crate::config::LineSettings;
use crate::error::NotifyError;
use crate::models::{Article, DigestEvent};
use crate::utils::truncate_chars;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument};

pub const LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

const MAX_MESSAGE_CHARS: usize = 4999;
const TRUNCATED_CHARS: usize = 4996;
const RULE_WIDTH: usize = 22;
const FOOTER_ROW_CHARS: usize = 36;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

/// Render the digest message text.
pub fn format_message(events: &[DigestEvent], articles: &[Article], now: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("Tech Daily Digest  {}", now.format("%Y-%m-%d %H:%M UTC")),
        rule(),
    ];

    for (i, event) in events.iter().enumerate() {
        lines.push(format!("\n{}. [{}] {}", i + 1, event.category, event.title));
        if !event.summary.is_empty() {
            lines.push(event.summary.clone());
        }
        if !event.url.is_empty() {
            lines.push(format!("→ {}", event.url));
        }
        if !event.source.is_empty() {
            lines.push(format!("via {}", event.source));
        }
    }

    lines.push(format!("\n{}", rule()));
    let counts = source_counts(articles);
    lines.push(format!(
        "Analyzed: {} sources / {} articles",
        counts.len(),
        articles.len()
    ));
    let parts: Vec<String> = counts
        .iter()
        .map(|(name, count)| format!("{name}({count})"))
        .collect();
    lines.extend(wrap_parts(&parts, FOOTER_ROW_CHARS));

    lines.join("\n")
}

/// Articles per source, most first, ties by name.
fn source_counts(articles: &[Article]) -> Vec<(&str, usize)> {
    articles
        .iter()
        .map(|a| a.source_name.as_str())
        .counts()
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)))
        .collect()
}

/// Join `parts` with two spaces, starting a new row before one would exceed
/// `width` characters. A single oversized part gets a row of its own.
fn wrap_parts(parts: &[String], width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut row = String::new();
    for part in parts {
        if row.is_empty() {
            row = part.clone();
        } else if row.chars().count() + 2 + part.chars().count() > width {
            rows.push(std::mem::replace(&mut row, part.clone()));
        } else {
            row.push_str("  ");
            row.push_str(part);
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows
}

/// Cut `text` to fit a single LINE text message.
pub fn fit_message(text: String) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        format!("{}...", truncate_chars(&text, TRUNCATED_CHARS))
    } else {
        text
    }
}

/// Push client for one LINE target.
#[derive(Debug, Clone)]
pub struct LineNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    target_id: String,
}

impl LineNotifier {
    /// Fails with [`NotifyError::MissingCredentials`] before any network use
    /// when the token or the target is missing or blank.
    pub fn new(settings: &LineSettings) -> Result<Self, NotifyError> {
        let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let (Some(token), Some(target_id)) = (
            present(&settings.channel_access_token),
            present(&settings.target_id),
        ) else {
            return Err(NotifyError::MissingCredentials);
        };

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: LINE_PUSH_URL.to_string(),
            token,
            target_id,
        })
    }

    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Push `text` (cut to the LINE limit) to the configured target.
    #[instrument(level = "info", skip_all, fields(chars = text.chars().count()))]
    pub async fn push(&self, text: String) -> Result<(), NotifyError> {
        let payload = json!({
            "to": self.target_id,
            "messages": [{ "type": "text", "text": fit_message(text) }],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "LINE API rejected the message");
            return Err(NotifyError::Status { status, body });
        }
        info!("LINE message sent");
        Ok(())
    }

    /// Format and push the digest.
    pub async fn notify(
        &self,
        events: &[DigestEvent],
        articles: &[Article],
        now: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.push(format_message(events, articles, now)).await
    }
}
