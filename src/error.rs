//! Error types for each stage of the pipeline.
//!
//! Fetch errors are always recoverable: the crawler logs them and moves on to
//! the next source or article. Configuration, digest and notification errors
//! end the run.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// A failed fetch of a listing, feed, sitemap or article page.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure, timeout or body read error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// The feed document could not be parsed.
    #[error("feed parse error: {0}")]
    Feed(String),

    /// The sitemap document is not well-formed XML.
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A CSS selector failed to parse.
    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// A malformed settings or sources file. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("source `{source_name}` is invalid: {reason}")]
    Invalid { source_name: String, reason: String },
}

/// Failure to turn the digest input into digest events.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("llm request failed: {0}")]
    Llm(String),

    #[error("llm answer is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("llm answer is not a JSON array")]
    NotAnArray,
}

/// Failure to deliver the digest to LINE.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("LINE channel access token or target id is missing")]
    MissingCredentials,

    #[error("LINE request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LINE API returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
}
