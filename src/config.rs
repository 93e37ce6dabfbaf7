//! Settings and source registry loading.
//!
//! Both files are read with `serde_yaml`, which also accepts plain JSON, so
//! `settings.json` / `sources.json` work as well as their YAML counterparts.
//! Any problem here is fatal: the run aborts before a single request is made.

use crate::error::ConfigError;
use crate::models::{Source, SourceKind};
use scraper::Selector;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Identifying user agent sent with every crawler request.
pub const DEFAULT_USER_AGENT: &str =
    "TechDigestBot/1.0 (+https://github.com/tech-digest/tech_digest)";

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crawler: CrawlerSettings,
    pub output: OutputSettings,
    pub line: LineSettings,
}

/// Knobs for the crawler stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    pub lookback_hours: u32,
    pub max_articles_per_source: usize,
    /// Cap on summary/body text per article, in characters.
    pub max_content_chars: usize,
    /// Per-request timeout, in seconds.
    pub request_timeout: u64,
    pub user_agent: String,
    pub max_concurrent_sources: usize,
    pub max_concurrent_pages: usize,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            max_articles_per_source: 5,
            max_content_chars: 500,
            request_timeout: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_sources: 4,
            max_concurrent_pages: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// How many events the LLM should pick.
    pub top_events: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { top_events: 5 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    pub channel_access_token: Option<String>,
    pub target_id: Option<String>,
}

impl Settings {
    /// Apply CLI/environment overrides for the LINE credentials.
    pub fn with_line_overrides(mut self, token: Option<String>, target: Option<String>) -> Self {
        if token.is_some() {
            self.line.channel_access_token = token;
        }
        if target.is_some() {
            self.line.target_id = target;
        }
        self
    }
}

/// The validated, ordered list of sources for this run.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Build a registry, validating every source.
    pub fn new(sources: Vec<Source>) -> Result<Self, ConfigError> {
        for source in &sources {
            validate_source(source)?;
        }
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[derive(Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<Value>,
}

/// Load the settings file. A missing file yields the defaults.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        info!("Settings file not found; using defaults");
        return Ok(Settings::default());
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse_settings(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if settings.crawler.lookback_hours == 0 {
        return Err(ConfigError::Invalid {
            source_name: "crawler".to_string(),
            reason: "lookback_hours must be greater than zero".to_string(),
        });
    }
    if settings.crawler.max_articles_per_source == 0 {
        return Err(ConfigError::Invalid {
            source_name: "crawler".to_string(),
            reason: "max_articles_per_source must be greater than zero".to_string(),
        });
    }

    info!(
        lookback_hours = settings.crawler.lookback_hours,
        max_articles_per_source = settings.crawler.max_articles_per_source,
        "Loaded settings"
    );
    Ok(settings)
}

fn parse_settings(text: &str) -> Result<Settings, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(text)
}

/// Load and validate the sources file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_sources(path: &Path) -> Result<SourceRegistry, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let registry = parse_sources(&text).map_err(|e| match e {
        SourcesError::Parse(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        SourcesError::Config(e) => e,
    })?;
    info!(count = registry.len(), "Loaded source registry");
    Ok(registry)
}

enum SourcesError {
    Parse(serde_yaml::Error),
    Config(ConfigError),
}

fn parse_sources(text: &str) -> Result<SourceRegistry, SourcesError> {
    let file: SourcesFile = serde_yaml::from_str(text).map_err(SourcesError::Parse)?;

    let mut sources = Vec::with_capacity(file.sources.len());
    for entry in file.sources {
        if is_doc_entry(&entry) {
            debug!("Skipping documentation-only source entry");
            continue;
        }
        let source: Source = serde_yaml::from_value(entry).map_err(SourcesError::Parse)?;
        sources.push(source);
    }

    SourceRegistry::new(sources).map_err(SourcesError::Config)
}

/// Entries made only of `_`-prefixed keys (`_section`, `_doc`) are comments.
fn is_doc_entry(entry: &Value) -> bool {
    match entry {
        Value::Mapping(map) => {
            !map.is_empty()
                && map
                    .iter()
                    .all(|(k, _)| k.as_str().is_some_and(|k| k.starts_with('_')))
        }
        _ => false,
    }
}

fn validate_source(source: &Source) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        source_name: source.name.clone(),
        reason,
    };

    if source.name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }

    match Url::parse(&source.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => return Err(invalid(format!("unsupported url scheme `{}`", url.scheme()))),
        Err(e) => return Err(invalid(format!("bad url `{}`: {e}", source.url))),
    }

    if source.max_articles == Some(0) {
        return Err(invalid("max_articles must be greater than zero".to_string()));
    }

    if let Some(selector) = &source.article_selector {
        if source.kind != SourceKind::Web {
            warn!(source = %source.name, kind = %source.kind, "article_selector is ignored for this source type");
        }
        Selector::parse(selector)
            .map_err(|e| invalid(format!("bad article_selector `{selector}`: {e}")))?;
    }

    Ok(())
}
