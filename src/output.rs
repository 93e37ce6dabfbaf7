//! JSON snapshot of the digest input.
//!
//! ```text
//! json_output_dir/
//! ├── 2025-02-20.json
//! └── 2025-02-21.json
//! ```
//!
//! One file per UTC day; a second run on the same day overwrites it.

use crate::models::DigestInput;
use crate::utils::ensure_writable_dir;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the snapshot for `input` under `json_output_dir`.
pub fn snapshot_path(input: &DigestInput, json_output_dir: &str) -> PathBuf {
    PathBuf::from(json_output_dir).join(format!("{}.json", input.generated_at.format("%Y-%m-%d")))
}

/// Write `input` as pretty JSON to `<json_output_dir>/<YYYY-MM-DD>.json`.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest_input(
    input: &DigestInput,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(input)?;

    if let Err(e) = ensure_writable_dir(json_output_dir).await {
        error!(error = %e, "JSON output directory is not writable");
        return Err(e);
    }

    let path = snapshot_path(input, json_output_dir);
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = input.articles.len(), "Wrote digest input JSON");
    Ok(path)
}
