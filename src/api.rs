//! LLM API interaction with exponential backoff retry logic.
//!
//! The digest is produced by a single request to an OpenAI-compatible
//! endpoint through `awful_aj`. Transient failures (overloaded model, rate
//! limits, dropped connections) are retried a small number of times with long
//! delays, since the whole run hinges on this one call.
//!
//! - [`AskAsync`]: core trait for async LLM interaction
//! - [`AwfulClient`]: wraps `awful_aj::api::ask`
//! - [`RetryAsk`]: decorator adding retries to any [`AskAsync`]
//!
//! # Retry Strategy
//!
//! - At most 2 retries (3 attempts in total)
//! - Exponential backoff starting at 15 seconds, capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Retries after the first failed attempt.
pub const MAX_RETRIES: usize = 2;
/// Delay before the first retry; doubles on each further retry.
pub const BASE_DELAY: StdDuration = StdDuration::from_secs(15);
pub const MAX_DELAY: StdDuration = StdDuration::from_secs(30);

/// Trait for async LLM interaction.
///
/// The summarizer only depends on this trait, so it can be driven by the real
/// client, the retry decorator, or a canned answer in tests.
pub trait AskAsync {
    type Response;

    /// Send `text` as the user message and return the model's answer.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Adds exponential backoff retries to any [`AskAsync`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// [`AskAsync`] over `awful_aj::api::ask` with a loaded config and template.
#[derive(Debug)]
pub struct AwfulClient<'a> {
    /// API endpoint, key and model settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and message framing.
    pub template: &'a ChatTemplate,
}

impl AskAsync for AwfulClient<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(prompt_chars = text.chars().count()))]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(answer) => info!(
                elapsed_ms = dt.as_millis() as u64,
                answer_chars = answer.chars().count(),
                "API call succeeded"
            ),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed"),
        }
        res
    }
}

/// The production client: [`AwfulClient`] wrapped in [`RetryAsk`].
pub fn digest_client<'a>(
    config: &'a AwfulJadeConfig,
    template: &'a ChatTemplate,
) -> RetryAsk<AwfulClient<'a>> {
    RetryAsk::new(AwfulClient { config, template }, MAX_RETRIES, BASE_DELAY)
}
