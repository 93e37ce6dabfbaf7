//! Command-line interface definitions for Tech Digest.
//!
//! LINE credentials can also come from the environment, which is how a
//! scheduled CI job usually provides them.

use clap::Parser;
use std::path::PathBuf;

/// Crawl tech news sources, pick the top events with an LLM and push them to LINE.
///
/// # Examples
///
/// ```sh
/// # Check sources without calling the LLM
/// tech_digest --crawl-only
///
/// # Full run, but print the digest instead of sending it
/// tech_digest --dry-run -j ./json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Sources file (YAML or JSON)
    #[arg(short, long, default_value = "config/sources.yaml")]
    pub sources: PathBuf,

    /// Settings file (YAML or JSON); defaults apply when it does not exist
    #[arg(long, default_value = "config/settings.yaml")]
    pub settings: PathBuf,

    /// Only crawl and print the collected articles
    #[arg(long)]
    pub crawl_only: bool,

    /// Crawl and summarize, print the digest, but do not send it
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the crawled articles as <DIR>/<YYYY-MM-DD>.json
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// awful_aj config.yaml (default: awful_aj config dir)
    #[arg(long)]
    pub llm_config: Option<PathBuf>,

    /// awful_aj template name used for the digest request
    #[arg(long, default_value = crate::summarizer::DEFAULT_TEMPLATE)]
    pub template: String,

    /// LINE channel access token
    #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub line_token: Option<String>,

    /// LINE user or group id to push to
    #[arg(long, env = "LINE_TARGET_ID")]
    pub line_target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tech_digest"]);

        assert_eq!(cli.sources, PathBuf::from("config/sources.yaml"));
        assert_eq!(cli.settings, PathBuf::from("config/settings.yaml"));
        assert!(!cli.crawl_only);
        assert!(!cli.dry_run);
        assert_eq!(cli.json_output_dir, None);
        assert_eq!(cli.template, "tech_digest");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "tech_digest",
            "-s",
            "/etc/digest/sources.json",
            "--settings",
            "/etc/digest/settings.json",
            "--crawl-only",
            "-j",
            "/tmp/json",
            "--llm-config",
            "/etc/aj/config.yaml",
            "--template",
            "cto_digest",
            "--line-token",
            "tok",
            "--line-target",
            "U123",
        ]);

        assert_eq!(cli.sources, PathBuf::from("/etc/digest/sources.json"));
        assert_eq!(cli.settings, PathBuf::from("/etc/digest/settings.json"));
        assert!(cli.crawl_only);
        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/json"));
        assert_eq!(cli.llm_config, Some(PathBuf::from("/etc/aj/config.yaml")));
        assert_eq!(cli.template, "cto_digest");
        assert_eq!(cli.line_token.as_deref(), Some("tok"));
        assert_eq!(cli.line_target.as_deref(), Some("U123"));
    }
}
