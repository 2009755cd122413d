// =============================================================================
// Vela Market Archiver — Main Entry Point
// =============================================================================
//
// Fetches historical candle data from an exchange's public REST API and
// appends it to per-pair CSV stores, resuming from the last persisted row.
// Snapshot jobs (book / trades / ticker) are one-shot passthroughs.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod clock;
mod config;
mod exchange;
mod fetch;
mod market_data;
mod store;
mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::clock::SystemClock;
use crate::config::FetchConfig;
use crate::exchange::{ExchangeClient, ExchangeId};
use crate::fetch::{FetchOptions, HistoryFetcher};
use crate::market_data::candle::parse_timestamp;
use crate::store::CandleStore;
use crate::types::{Granularity, JobKind, Pair};

/// Default config file next to the binary.
const CONFIG_PATH: &str = "vela_config.json";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Vela Market Archiver — Starting Up                ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = FetchConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        FetchConfig::default()
    });

    apply_env_overrides(&mut config);

    // ── 2. Validate into typed form (fatal before any request) ──────────
    let exchange: ExchangeId = config.exchange.parse()?;
    let job: JobKind = config.job.parse()?;
    let granularity: Granularity = config.granularity.parse()?;

    let pairs: Vec<Pair> = config
        .pairs
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_>>()
        .context("invalid pair in config")?;
    anyhow::ensure!(!pairs.is_empty(), "no pairs configured");

    let start = config
        .start
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .context("invalid start date in config")?;
    let end = match config.end.as_deref() {
        None | Some("now") => None,
        Some(s) => Some(parse_timestamp(s).context("invalid end date in config")?),
    };

    let profile = exchange.profile();
    info!(
        exchange = %exchange,
        job = %job,
        granularity = %granularity,
        pairs = ?config.pairs,
        batch_size = profile.max_candles_per_request,
        "configuration resolved"
    );

    // ── 3. Build exchange client ─────────────────────────────────────────
    let client = ExchangeClient::new(profile.clone());
    let clock = SystemClock;

    // ── 4. Run the selected job, one pair at a time ──────────────────────
    match job {
        JobKind::History => {
            for pair in &pairs {
                let store = CandleStore::new(&config.data_dir, exchange, pair);
                let opts = FetchOptions {
                    pair: pair.clone(),
                    granularity,
                    start,
                    end,
                    max_candles_per_request: profile.max_candles_per_request,
                    rate_limit_interval: profile.rate_limit_interval,
                    retry_backoff: Duration::from_secs(config.retry_backoff_secs),
                    max_retries: config.max_retries,
                };

                let fetcher = HistoryFetcher::new(&client, &clock, store.clone(), opts);
                let summary = fetcher
                    .run()
                    .await
                    .with_context(|| format!("history fetch for {pair} failed"))?;

                info!(
                    pair = %pair.slashed(),
                    appended = summary.rows_appended,
                    pages = summary.pages_fetched,
                    store_rows = store.row_count()?,
                    path = %store.path().display(),
                    "pair complete"
                );
            }
        }
        JobKind::Book => {
            for pair in &pairs {
                let book = client.get_order_book(pair, config.book_depth).await?;
                info!(
                    pair = %pair.slashed(),
                    best_bid = ?book.best_bid(),
                    best_ask = ?book.best_ask(),
                    spread_bps = ?book.spread_bps(),
                    bid_levels = book.bids.len(),
                    ask_levels = book.asks.len(),
                    "order book snapshot"
                );
            }
        }
        JobKind::Trades => {
            for pair in &pairs {
                let trades = client.get_recent_trades(pair, config.trade_limit).await?;
                info!(pair = %pair.slashed(), count = trades.len(), "recent trades");
                for t in &trades {
                    info!(time = %t.time, price = t.price, size = t.size, side = %t.side, "trade");
                }
            }
        }
        JobKind::Ticker => {
            for pair in &pairs {
                let ticker = client.get_ticker(pair).await?;
                info!(pair = %ticker.pair, price = ticker.price, "ticker");
            }
        }
    }

    info!("Vela run complete.");
    Ok(())
}

/// Apply `VELA_*` environment overrides on top of the file config.
fn apply_env_overrides(config: &mut FetchConfig) {
    if let Ok(v) = std::env::var("VELA_EXCHANGE") {
        config.exchange = v;
    }
    if let Ok(v) = std::env::var("VELA_PAIRS") {
        config.pairs = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(v) = std::env::var("VELA_GRANULARITY") {
        config.granularity = v;
    }
    if let Ok(v) = std::env::var("VELA_START") {
        config.start = Some(v);
    }
    if let Ok(v) = std::env::var("VELA_END") {
        config.end = Some(v);
    }
    if let Ok(v) = std::env::var("VELA_JOB") {
        config.job = v;
    }
    if let Ok(v) = std::env::var("VELA_DATA_DIR") {
        config.data_dir = v;
    }
}
