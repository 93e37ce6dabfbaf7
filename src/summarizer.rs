//! Turn the digest input into a ranked list of events with one LLM request.
//!
//! All articles go into a single prompt as a slim JSON array (title, source,
//! url, publish time and a short summary), which keeps the token count low
//! enough for a once-a-day run. The model answers with a JSON array of
//! [`DigestEvent`]s.

use crate::api::AskAsync;
use crate::error::DigestError;
use crate::models::{Article, DigestEvent, DigestInput};
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

/// Default `awful_aj` template name.
pub const DEFAULT_TEMPLATE: &str = "tech_digest";

/// Per-article summary length in the payload, in characters.
const PAYLOAD_SUMMARY_CHARS: usize = 400;

const PROMPT_TEMPLATE: &str = r#"You are a technology news editor preparing a daily digest for busy engineers.
Below is a JSON list of articles collected from technology outlets over the past {lookback_hours} hours.
Some articles have "published_at": "unknown"; judge from the content whether they are recent.

Pick the {top_n} events with the widest impact and most worth attention. Prefer:
- major AI / ML advances or product launches
- important updates to cloud, platforms and developer tools
- security vulnerabilities and incidents
- open-source developments that affect the developer ecosystem

Summaries state what happened and why it matters. Be objective and concise,
no advice or calls to action, at most 100 words each.

Answer with a JSON array only. Each object has the fields:
- rank: integer 1-{top_n}
- title: event title
- summary: summary, at most 100 words
- url: the article URL, unchanged
- source: name of the source outlet
- category: one of AI / Cloud / Security / DevTools / Open Source / Platform / Other

Articles:
{articles_json}
"#;

#[derive(Serialize)]
struct PayloadArticle<'a> {
    title: &'a str,
    source: &'a str,
    url: &'a str,
    published_at: String,
    summary: String,
}

impl<'a> From<&'a Article> for PayloadArticle<'a> {
    fn from(a: &'a Article) -> Self {
        Self {
            title: &a.title,
            source: &a.source_name,
            url: &a.url,
            published_at: a.published_label(),
            summary: truncate_chars(a.body_text.as_deref().unwrap_or_default(), PAYLOAD_SUMMARY_CHARS),
        }
    }
}

/// Serialize the articles into the slim payload embedded in the prompt.
pub fn build_payload(articles: &[Article]) -> Result<String, serde_json::Error> {
    let slim: Vec<PayloadArticle<'_>> = articles.iter().map(PayloadArticle::from).collect();
    serde_json::to_string(&slim)
}

/// The full user message for the digest request.
pub fn build_prompt(input: &DigestInput, top_n: usize) -> Result<String, DigestError> {
    let payload = build_payload(&input.articles)?;
    Ok(PROMPT_TEMPLATE
        .replace("{lookback_hours}", &input.lookback_hours.to_string())
        .replace("{top_n}", &top_n.to_string())
        .replace("{articles_json}", &payload))
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line. On a
    // single-line fence the body starts right after the info string.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the model's answer into at most `top_n` events.
pub fn parse_events(raw: &str, top_n: usize) -> Result<Vec<DigestEvent>, DigestError> {
    let value: serde_json::Value = serde_json::from_str(strip_fences(raw))?;
    if !value.is_array() {
        return Err(DigestError::NotAnArray);
    }
    let mut events: Vec<DigestEvent> = serde_json::from_value(value)?;
    events.truncate(top_n);
    Ok(events)
}

/// Ask `client` for the digest of `input`.
///
/// An empty input returns no events without a request. A truncated answer
/// (EOF while parsing) is asked for exactly once more.
#[instrument(level = "info", skip_all, fields(articles = input.articles.len(), top_n))]
pub async fn summarize<A>(
    client: &A,
    input: &DigestInput,
    top_n: usize,
) -> Result<Vec<DigestEvent>, DigestError>
where
    A: AskAsync<Response = String>,
{
    if input.articles.is_empty() {
        warn!("No articles to summarize");
        return Ok(Vec::new());
    }

    let prompt = build_prompt(input, top_n)?;
    debug!(prompt_chars = prompt.chars().count(), "Built digest prompt");

    let raw = ask(client, &prompt).await?;
    let parsed = match parse_events(&raw, top_n) {
        Err(DigestError::Parse(ref e)) if looks_truncated(e) => {
            warn!(error = %e, "EOF while parsing; re-asking once");
            let retry = ask(client, &prompt).await?;
            parse_events(&retry, top_n).inspect_err(|e| log_bad_answer(e, &retry))
        }
        other => other.inspect_err(|e| log_bad_answer(e, &raw)),
    }?;

    info!(events = parsed.len(), "Digest ready");
    Ok(parsed)
}

async fn ask<A>(client: &A, prompt: &str) -> Result<String, DigestError>
where
    A: AskAsync<Response = String>,
{
    client
        .ask(prompt)
        .await
        .map_err(|e| DigestError::Llm(e.to_string()))
}

fn log_bad_answer(e: &DigestError, raw: &str) {
    error!(
        error = %e,
        response_preview = %truncate_for_log(raw, 300),
        "Model returned non-conforming JSON"
    );
}
