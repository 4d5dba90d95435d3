//! The JSON summary written after each run.

use anyhow::Context;
use price_scraper::ScrapedProduct;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Failure details recorded in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub ok: bool,
    pub duration_ms: u64,
    pub transport: String,
    pub mode: String,
    pub query: Option<String>,
    pub url: Option<String>,
    pub marketplace: String,
    pub result_count: usize,
    pub top_results: Vec<ScrapedProduct>,
    pub error: Option<RunError>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunSummary {
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
