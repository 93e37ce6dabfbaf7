//! # Tech Digest
//!
//! A daily tech-news pipeline: crawl RSS feeds, sitemaps and listing pages,
//! keep what was published in the lookback window, let an LLM pick the most
//! important events, and push them to LINE.
//!
//! ## Usage
//!
//! ```sh
//! tech_digest --crawl-only          # check sources
//! tech_digest --dry-run             # crawl + summarize, print only
//! tech_digest                       # full run
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: settings and sources files, validated up front
//! 2. **Crawling**: every source through its fetch strategy, bounded concurrency
//! 3. **Aggregation**: time window, per-source cap, URL dedup
//! 4. **Summarizing**: one LLM request for the top events
//! 5. **Notification**: a single LINE push message

use awful_aj::{config as aj_config, config_dir, template};
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod api;
mod cli;
mod config;
mod crawler;
mod error;
mod extract;
mod fetchers;
mod http;
mod models;
mod notifier;
mod output;
mod report;
mod summarizer;
mod utils;
mod window;

use cli::Cli;
use models::DigestInput;
use notifier::LineNotifier;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tech_digest starting up");

    let args = Cli::parse();
    debug!(
        sources = %args.sources.display(),
        settings = %args.settings.display(),
        crawl_only = args.crawl_only,
        dry_run = args.dry_run,
        "Parsed CLI arguments"
    );

    // ---- Configuration (fatal on any error) ----
    let settings = config::load_settings(&args.settings)
        .inspect_err(|e| error!(error = %e, "Invalid settings"))?
        .with_line_overrides(args.line_token.clone(), args.line_target.clone());
    let registry = config::load_sources(&args.sources)
        .inspect_err(|e| error!(error = %e, "Invalid sources"))?;

    // ---- Crawl ----
    let now = Utc::now();
    let articles = crawler::crawl_all(&registry, &settings.crawler, now).await?;
    let input = DigestInput {
        generated_at: now,
        lookback_hours: settings.crawler.lookback_hours,
        articles,
    };

    if let Some(dir) = args.json_output_dir.as_deref() {
        if let Err(e) = output::write_digest_input(&input, dir).await {
            error!(path = %dir, error = %e, "Failed to write digest input JSON");
        }
    }

    if input.articles.is_empty() {
        warn!("No articles collected; nothing to do");
        return Ok(());
    }

    if args.crawl_only {
        print!("{}", report::crawl_report(&input.articles));
        info!(
            articles = input.articles.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Crawl-only run finished"
        );
        return Ok(());
    }

    // ---- Summarize ----
    let events = summarize(&args, &input, settings.output.top_events)
        .await
        .inspect_err(|e| error!(error = %e, "Summarizing failed"))?;

    if events.is_empty() {
        warn!("LLM returned no events; nothing to send");
        return Ok(());
    }
    print!("{}", report::digest_report(&events));

    if args.dry_run {
        info!(
            events = events.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Dry run finished; LINE push skipped"
        );
        return Ok(());
    }

    // ---- Notify ----
    info!(events = events.len(), "Sending digest to LINE");
    LineNotifier::new(&settings.line)
        .inspect_err(|e| error!(error = %e, "LINE notifier not configured"))?
        .notify(&events, &input.articles, Utc::now())
        .await
        .inspect_err(|e| error!(error = %e, "LINE push failed"))?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "tech_digest finished"
    );
    Ok(())
}

/// Load the `awful_aj` config and template, then run the summarizer.
async fn summarize(
    args: &Cli,
    input: &DigestInput,
    top_n: usize,
) -> Result<Vec<models::DigestEvent>, Box<dyn Error>> {
    let config_path = match &args.llm_config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = config_path
        .to_str()
        .ok_or("LLM config path is not valid UTF-8")?
        .to_string();
    let llm_config = aj_config::load_config(&config_path)?;
    info!(config_path = %config_path, "Loaded LLM configuration");

    let template = template::load_template(&args.template).await?;
    info!(template = %args.template, "Loaded template");

    let client = api::digest_client(&llm_config, &template);
    Ok(summarizer::summarize(&client, input, top_n).await?)
}
