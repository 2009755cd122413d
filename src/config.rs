// =============================================================================
// Fetch Configuration — JSON settings with atomic save
// =============================================================================
//
// All tunables for an archiver run live here. Exchange, pair, granularity
// and job are kept as plain strings in the file and validated into their
// typed forms at startup, so a typo fails the run before any request is
// sent. Every field carries `#[serde(default)]` so adding new fields never
// breaks loading an older config file. Persistence uses an atomic
// tmp + rename pattern to prevent corruption on crash.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_exchange() -> String {
    "coinbasepro".to_string()
}

fn default_pairs() -> Vec<String> {
    vec!["BTC-USD".to_string()]
}

fn default_granularity() -> String {
    "1m".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_job() -> String {
    "history".to_string()
}

fn default_retry_backoff_secs() -> u64 {
    1
}

fn default_trade_limit() -> u32 {
    100
}

// =============================================================================
// FetchConfig
// =============================================================================

/// Top-level configuration for one archiver run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Exchange identifier, e.g. `coinbasepro` or `binance`.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Currency pairs to process, in `BASE-QUOTE` form.
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,

    /// Candle bucket duration, e.g. `1m`, `1h`, or raw seconds.
    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Window start (`YYYY-MM-DD HH:MM:SS`). Required for the first fetch
    /// of a pair; ignored once its store exists.
    #[serde(default)]
    pub start: Option<String>,

    /// Window end (`YYYY-MM-DD HH:MM:SS`). Absent or `"now"` means the
    /// current minute.
    #[serde(default)]
    pub end: Option<String>,

    /// Directory the CSV stores live in.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Job to run: `history`, `book`, `trades`, or `ticker`.
    #[serde(default = "default_job")]
    pub job: String,

    /// Pause before retrying a failed page fetch.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Attempts per page before giving up; 0 retries forever (the
    /// historical behavior).
    #[serde(default)]
    pub max_retries: u32,

    /// Order-book depth for the `book` job (exchange default when absent).
    #[serde(default)]
    pub book_depth: Option<u32>,

    /// Row cap for the `trades` job.
    #[serde(default = "default_trade_limit")]
    pub trade_limit: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            pairs: default_pairs(),
            granularity: default_granularity(),
            start: None,
            end: None,
            data_dir: default_data_dir(),
            job: default_job(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_retries: 0,
            book_depth: None,
            trade_limit: default_trade_limit(),
        }
    }
}

impl FetchConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            exchange = %config.exchange,
            pairs = ?config.pairs,
            job = %config.job,
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }
}
