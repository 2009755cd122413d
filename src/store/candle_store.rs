// =============================================================================
// Candle Store — append-only CSV time-series cache
// =============================================================================
//
// One file per exchange + pair at `{data_dir}/{exchange}_{pair}.csv`.
// Invariants: header written exactly once at creation, rows appended whole
// in ascending time order, file never rewritten or compacted. The last
// row's timestamp is the resume point for the next fetch.
// =============================================================================

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::exchange::ExchangeId;
use crate::market_data::candle::parse_timestamp;
use crate::market_data::Candle;
use crate::types::Pair;

/// Column order of the store file.
const HEADER: [&str; 6] = ["time", "open", "high", "low", "close", "volume"];

/// Append-only CSV store for one candle series.
#[derive(Debug, Clone)]
pub struct CandleStore {
    path: PathBuf,
}

impl CandleStore {
    /// Derive the store path for an exchange + pair under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>, exchange: ExchangeId, pair: &Pair) -> Self {
        let file_name = format!("{}_{}.csv", exchange.name(), pair.file_stem());
        Self {
            path: data_dir.as_ref().join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the timestamp of the last persisted row.
    ///
    /// Returns `Ok(None)` when the store does not exist yet (or holds only
    /// a header). A malformed tail row is a hard error — resuming from a
    /// corrupted store would silently duplicate or skip buckets.
    pub fn last_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        if !self.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open store at {}", self.path.display()))?;

        let mut last: Option<csv::StringRecord> = None;
        for record in reader.records() {
            last = Some(record.with_context(|| {
                format!("malformed row in store at {}", self.path.display())
            })?);
        }

        match last {
            None => Ok(None),
            Some(record) => {
                let field = record.get(0).with_context(|| {
                    format!("empty last row in store at {}", self.path.display())
                })?;
                let ts = parse_timestamp(field).with_context(|| {
                    format!("malformed last row in store at {}", self.path.display())
                })?;
                debug!(path = %self.path.display(), last = %ts, "resume point read");
                Ok(Some(ts))
            }
        }
    }

    /// Append candles to the store, creating it (with header) on first use.
    ///
    /// Rows are written whole; a crash mid-page loses at most the page in
    /// flight, never a partial row. Returns the number of rows appended.
    pub fn append(&self, candles: &[Candle]) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let create = !self.exists();
        if create {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data directory {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open store at {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if create {
            writer
                .write_record(HEADER)
                .context("failed to write store header")?;
        }

        for candle in candles {
            writer
                .write_record([
                    candle.time_string(),
                    candle.open.to_string(),
                    candle.high.to_string(),
                    candle.low.to_string(),
                    candle.close.to_string(),
                    candle.volume.to_string(),
                ])
                .context("failed to write candle row")?;
        }

        writer.flush().context("failed to flush store")?;

        if create {
            info!(path = %self.path.display(), rows = candles.len(), "store created");
        }
        Ok(candles.len())
    }

    /// Number of data rows currently in the store (0 when absent).
    pub fn row_count(&self) -> Result<usize> {
        if !self.exists() {
            return Ok(0);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open store at {}", self.path.display()))?;
        let mut count = 0usize;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }
}
