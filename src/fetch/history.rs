// =============================================================================
// History Fetcher — incremental paginated candle download
// =============================================================================
//
// The core control loop: resolve a half-open fetch window [start, end),
// page through the exchange's batch-size ceiling, normalize each page, and
// append it to the CSV store. Resumption is driven entirely by the store:
// if it exists, the window starts one granularity step after its last row,
// so re-runs never duplicate and never skip a bucket.
//
// The cursor advances from the rows actually returned, not from the
// requested page end — exchanges cap results short of the live edge.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::clock::{truncate_to_minute, Clock};
use crate::exchange::FetchError;
use crate::market_data::{candle, Candle};
use crate::store::CandleStore;
use crate::types::{Granularity, Pair};

/// Capability the fetch loop consumes: one page of candles per call.
///
/// [`crate::exchange::ExchangeClient`] is the production implementation;
/// tests drive the loop with a scripted source.
#[allow(async_fn_in_trait)]
pub trait CandleSource {
    async fn fetch_candles(
        &self,
        pair: &Pair,
        granularity: Granularity,
        start: NaiveDateTime,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError>;
}

/// Parameters for one history fetch job.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub pair: Pair,
    pub granularity: Granularity,
    /// Window start when the store does not exist yet. Ignored (the store
    /// wins) once there is a resume point.
    pub start: Option<NaiveDateTime>,
    /// Window end; `None` means "now", truncated to the minute.
    pub end: Option<NaiveDateTime>,
    /// Exchange batch ceiling (from the profile).
    pub max_candles_per_request: u32,
    /// Mandated pause between page requests (from the profile).
    pub rate_limit_interval: Duration,
    /// Pause before retrying a failed page.
    pub retry_backoff: Duration,
    /// Attempts per page before giving up; 0 retries forever.
    pub max_retries: u32,
}

/// What a completed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub rows_appended: usize,
    pub pages_fetched: u32,
}

/// The incremental candle fetcher. Generic over its collaborators so the
/// loop can be exercised without a network or a real clock.
pub struct HistoryFetcher<'a, S: CandleSource, C: Clock> {
    source: &'a S,
    clock: &'a C,
    store: CandleStore,
    opts: FetchOptions,
}

impl<'a, S: CandleSource, C: Clock> HistoryFetcher<'a, S, C> {
    pub fn new(source: &'a S, clock: &'a C, store: CandleStore, opts: FetchOptions) -> Self {
        Self {
            source,
            clock,
            store,
            opts,
        }
    }

    /// Resolve the effective half-open window [start, end).
    ///
    /// Start: one step past the store's last row when the store exists,
    /// otherwise the configured start. End: the configured end, or "now"
    /// truncated to the minute.
    fn resolve_window(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let start = match self
            .store
            .last_timestamp()
            .context("failed to read resume point")?
        {
            Some(last) => {
                let resumed = last + self.opts.granularity.step();
                info!(
                    pair = %self.opts.pair,
                    last_row = %last,
                    resumed_start = %resumed,
                    "store exists — resuming after last persisted row"
                );
                resumed
            }
            None => self.opts.start.with_context(|| {
                format!(
                    "store {} does not exist and no start date was configured",
                    self.store.path().display()
                )
            })?,
        };

        let end = match self.opts.end {
            Some(end) => end,
            None => truncate_to_minute(self.clock.now_utc()),
        };

        Ok((start, end))
    }

    /// Run the fetch to completion. Transient page failures are retried at
    /// the same cursor; fatal ones abort the run.
    pub async fn run(&self) -> Result<FetchSummary> {
        let (start, end) = self.resolve_window()?;
        let step = self.opts.granularity.step();
        let step_secs = self.opts.granularity.secs();

        if start >= end {
            info!(pair = %self.opts.pair, start = %start, end = %end, "store is up to date");
            return Ok(FetchSummary {
                rows_appended: 0,
                pages_fetched: 0,
            });
        }

        info!(
            pair = %self.opts.pair,
            granularity = %self.opts.granularity,
            start = %start,
            end = %end,
            "fetching candle history"
        );

        let mut cursor = start;
        let mut rows_appended = 0usize;
        let mut pages_fetched = 0u32;

        while cursor < end {
            // Buckets left in [cursor, end), capped at the exchange ceiling.
            let remaining = ((end - cursor).num_seconds() + step_secs - 1) / step_secs;
            let limit = (remaining as u32).min(self.opts.max_candles_per_request);

            let mut page = self.fetch_page(cursor, limit).await?;
            pages_fetched += 1;

            candle::normalize(&mut page);
            page.dedup_by_key(|c| c.time);
            // Clamp to the half-open window: live-edge partial buckets and
            // overlapping history both violate the store's ordering invariant.
            page.retain(|c| c.time >= cursor && c.time < end);

            let Some(last) = page.last() else {
                info!(
                    pair = %self.opts.pair,
                    cursor = %cursor,
                    "exchange returned nothing before window end — stopping"
                );
                break;
            };
            let last_time = last.time;

            rows_appended += self.store.append(&page).context("failed to append page")?;
            info!(
                pair = %self.opts.pair,
                page_start = %cursor,
                page_rows = page.len(),
                total_rows = rows_appended,
                "page appended"
            );

            // Advance from what actually came back, not the requested end.
            cursor = last_time + step;

            tokio::time::sleep(self.opts.rate_limit_interval).await;
        }

        info!(
            pair = %self.opts.pair,
            rows = rows_appended,
            pages = pages_fetched,
            "history fetch complete"
        );
        Ok(FetchSummary {
            rows_appended,
            pages_fetched,
        })
    }

    /// Fetch one page, retrying transient failures at the same cursor.
    async fn fetch_page(&self, cursor: NaiveDateTime, limit: u32) -> Result<Vec<Candle>> {
        let mut attempts = 0u32;
        loop {
            match self
                .source
                .fetch_candles(&self.opts.pair, self.opts.granularity, cursor, limit)
                .await
            {
                Ok(rows) => return Ok(rows),
                Err(err @ FetchError::Fatal(_)) => {
                    return Err(err).with_context(|| {
                        format!("page fetch at {cursor} failed permanently")
                    });
                }
                Err(err) => {
                    attempts += 1;
                    if self.opts.max_retries > 0 && attempts >= self.opts.max_retries {
                        return Err(err).with_context(|| {
                            format!("page fetch at {cursor} failed after {attempts} attempts")
                        });
                    }
                    warn!(
                        pair = %self.opts.pair,
                        cursor = %cursor,
                        attempt = attempts,
                        error = %err,
                        "page fetch failed — retrying same cursor"
                    );
                    tokio::time::sleep(self.opts.retry_backoff).await;
                }
            }
        }
    }
}
