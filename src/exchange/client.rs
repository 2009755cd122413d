// =============================================================================
// Exchange REST Client — public market-data endpoints
// =============================================================================
//
// One client serves both supported exchanges; the profile selected at
// construction decides endpoint shape and response parsing. Only public
// (unsigned) endpoints are used — candles, order book, trades, ticker.
// =============================================================================

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::exchange::error::FetchError;
use crate::exchange::profile::{ExchangeId, ExchangeProfile};
use crate::fetch::CandleSource;
use crate::market_data::{Candle, Level, OrderBookSnapshot, Ticker, Trade, TradeSide};
use crate::market_data::candle::{from_epoch_millis, from_epoch_secs};
use crate::types::{Granularity, Pair};

/// Coinbase reports trade times as ISO 8601 with fractional seconds.
const COINBASE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Depth used when the caller does not specify one (Binance levels).
const DEFAULT_BINANCE_DEPTH: u32 = 100;
/// Book level used when the caller does not specify one (Coinbase: top 50).
const DEFAULT_COINBASE_LEVEL: u32 = 2;

/// REST client for one exchange's public market-data endpoints.
#[derive(Clone)]
pub struct ExchangeClient {
    profile: ExchangeProfile,
    client: reqwest::Client,
}

impl ExchangeClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(profile: ExchangeProfile) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            // Coinbase rejects requests without a User-Agent.
            .user_agent("vela-archiver/1.0")
            .build()
            .expect("failed to build reqwest client");

        debug!(exchange = %profile.id, base_url = %profile.base_url, "ExchangeClient initialised");

        Self { profile, client }
    }

    pub fn profile(&self) -> &ExchangeProfile {
        &self.profile
    }

    // -------------------------------------------------------------------------
    // Request plumbing
    // -------------------------------------------------------------------------

    /// GET `path` with `params`, check the status, and parse the body as JSON.
    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.profile.base_url, path);

        let resp = self.client.get(&url).query(params).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(FetchError::malformed)
    }

    // -------------------------------------------------------------------------
    // Candles
    // -------------------------------------------------------------------------

    /// Fetch up to `limit` candles starting at `start` (bucket start, UTC).
    ///
    /// Rows are normalized to the canonical [`Candle`] shape but returned in
    /// whatever order the exchange produced — the caller sorts.
    #[instrument(skip(self), name = "exchange::get_candles", fields(exchange = %self.profile.id))]
    pub async fn get_candles(
        &self,
        pair: &Pair,
        granularity: Granularity,
        start: NaiveDateTime,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let body = match self.profile.id {
            ExchangeId::Binance => {
                let start_ms = start.and_utc().timestamp_millis();
                self.get_json(
                    "/api/v3/klines",
                    &[
                        ("symbol", pair.concatenated()),
                        ("interval", granularity.label().to_string()),
                        ("startTime", start_ms.to_string()),
                        ("limit", limit.to_string()),
                    ],
                )
                .await?
            }
            ExchangeId::CoinbasePro => {
                // Coinbase takes an inclusive ISO window instead of a limit.
                let end = start + granularity.step() * (limit.saturating_sub(1) as i32);
                self.get_json(
                    &format!("/products/{}/candles", pair.dashed()),
                    &[
                        ("granularity", granularity.secs().to_string()),
                        ("start", start.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                        ("end", end.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                    ],
                )
                .await?
            }
        };

        let candles = match self.profile.id {
            ExchangeId::Binance => parse_binance_klines(&body)?,
            ExchangeId::CoinbasePro => parse_coinbase_candles(&body)?,
        };

        debug!(pair = %pair, granularity = %granularity, count = candles.len(), "candles fetched");
        Ok(candles)
    }

    // -------------------------------------------------------------------------
    // Order book / trades / ticker (single-call passthroughs)
    // -------------------------------------------------------------------------

    /// Fetch a point-in-time order book snapshot.
    ///
    /// `depth` maps to Binance's `limit` parameter and Coinbase's book
    /// `level`; each exchange's default is used when absent.
    #[instrument(skip(self), name = "exchange::get_order_book", fields(exchange = %self.profile.id))]
    pub async fn get_order_book(
        &self,
        pair: &Pair,
        depth: Option<u32>,
    ) -> Result<OrderBookSnapshot, FetchError> {
        let body = match self.profile.id {
            ExchangeId::Binance => {
                let limit = depth.unwrap_or(DEFAULT_BINANCE_DEPTH);
                self.get_json(
                    "/api/v3/depth",
                    &[
                        ("symbol", pair.concatenated()),
                        ("limit", limit.to_string()),
                    ],
                )
                .await?
            }
            ExchangeId::CoinbasePro => {
                let level = depth.unwrap_or(DEFAULT_COINBASE_LEVEL);
                self.get_json(
                    &format!("/products/{}/book", pair.dashed()),
                    &[("level", level.to_string())],
                )
                .await?
            }
        };

        let book = parse_order_book(&body, &pair.dashed())?;
        debug!(pair = %pair, bids = book.bids.len(), asks = book.asks.len(), "order book fetched");
        Ok(book)
    }

    /// Fetch the exchange's most recent trades, unmodified.
    #[instrument(skip(self), name = "exchange::get_recent_trades", fields(exchange = %self.profile.id))]
    pub async fn get_recent_trades(
        &self,
        pair: &Pair,
        limit: u32,
    ) -> Result<Vec<Trade>, FetchError> {
        let (body, parse): (Value, fn(&Value) -> Result<Vec<Trade>, FetchError>) =
            match self.profile.id {
                ExchangeId::Binance => (
                    self.get_json(
                        "/api/v3/trades",
                        &[
                            ("symbol", pair.concatenated()),
                            ("limit", limit.to_string()),
                        ],
                    )
                    .await?,
                    parse_binance_trades,
                ),
                ExchangeId::CoinbasePro => (
                    self.get_json(
                        &format!("/products/{}/trades", pair.dashed()),
                        &[("limit", limit.to_string())],
                    )
                    .await?,
                    parse_coinbase_trades,
                ),
            };

        let trades = parse(&body)?;
        debug!(pair = %pair, count = trades.len(), "recent trades fetched");
        Ok(trades)
    }

    /// Fetch the last traded price.
    #[instrument(skip(self), name = "exchange::get_ticker", fields(exchange = %self.profile.id))]
    pub async fn get_ticker(&self, pair: &Pair) -> Result<Ticker, FetchError> {
        let body = match self.profile.id {
            ExchangeId::Binance => {
                self.get_json("/api/v3/ticker/price", &[("symbol", pair.concatenated())])
                    .await?
            }
            ExchangeId::CoinbasePro => {
                self.get_json(&format!("/products/{}/ticker", pair.dashed()), &[])
                    .await?
            }
        };

        let price = parse_field_f64(&body["price"], "price")?;
        Ok(Ticker {
            pair: pair.dashed(),
            price,
        })
    }
}

impl CandleSource for ExchangeClient {
    async fn fetch_candles(
        &self,
        pair: &Pair,
        granularity: Granularity,
        start: NaiveDateTime,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        self.get_candles(pair, granularity, start, limit).await
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("exchange", &self.profile.id)
            .field("base_url", &self.profile.base_url)
            .finish()
    }
}

// =============================================================================
// Wire parsing — free functions so they are testable without a network
// =============================================================================

/// Parse a JSON value that may be either a string or a number into `f64`.
/// Exchanges encode prices as strings to dodge float truncation.
fn parse_field_f64(val: &Value, name: &str) -> Result<f64, FetchError> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|_| FetchError::malformed(format!("field {name}: '{s}' is not a number")))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        Err(FetchError::malformed(format!(
            "field {name}: expected string or number, got {val}"
        )))
    }
}

/// Binance `GET /api/v3/klines` — array of arrays:
///   [0] openTime(ms), [1] open, [2] high, [3] low, [4] close, [5] volume, ...
fn parse_binance_klines(body: &Value) -> Result<Vec<Candle>, FetchError> {
    let rows = body
        .as_array()
        .ok_or_else(|| FetchError::malformed("klines response is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row
            .as_array()
            .ok_or_else(|| FetchError::malformed("kline entry is not an array"))?;
        if arr.len() < 6 {
            return Err(FetchError::malformed(format!(
                "kline entry has {} elements",
                arr.len()
            )));
        }

        let open_ms = arr[0]
            .as_i64()
            .ok_or_else(|| FetchError::malformed("kline open time is not an integer"))?;
        let time = from_epoch_millis(open_ms).map_err(FetchError::malformed)?;

        candles.push(Candle::new(
            time,
            parse_field_f64(&arr[1], "open")?,
            parse_field_f64(&arr[2], "high")?,
            parse_field_f64(&arr[3], "low")?,
            parse_field_f64(&arr[4], "close")?,
            parse_field_f64(&arr[5], "volume")?,
        ));
    }
    Ok(candles)
}

/// Coinbase `GET /products/{id}/candles` — array of arrays, newest first:
///   [0] time(s), [1] low, [2] high, [3] open, [4] close, [5] volume
fn parse_coinbase_candles(body: &Value) -> Result<Vec<Candle>, FetchError> {
    let rows = body
        .as_array()
        .ok_or_else(|| FetchError::malformed("candles response is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row
            .as_array()
            .ok_or_else(|| FetchError::malformed("candle entry is not an array"))?;
        if arr.len() < 6 {
            return Err(FetchError::malformed(format!(
                "candle entry has {} elements",
                arr.len()
            )));
        }

        let secs = arr[0]
            .as_i64()
            .ok_or_else(|| FetchError::malformed("candle time is not an integer"))?;
        let time = from_epoch_secs(secs).map_err(FetchError::malformed)?;

        // Note the low/high/open ordering — it differs from Binance.
        candles.push(Candle::new(
            time,
            parse_field_f64(&arr[3], "open")?,
            parse_field_f64(&arr[2], "high")?,
            parse_field_f64(&arr[1], "low")?,
            parse_field_f64(&arr[4], "close")?,
            parse_field_f64(&arr[5], "volume")?,
        ));
    }
    Ok(candles)
}

/// Both exchanges encode book sides as arrays of `[price, size, ...]` with
/// string-encoded numbers; extra trailing elements are ignored.
fn parse_book_side(side: &Value, name: &str) -> Result<Vec<Level>, FetchError> {
    let rows = side
        .as_array()
        .ok_or_else(|| FetchError::malformed(format!("book side '{name}' is not an array")))?;

    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row
            .as_array()
            .filter(|a| a.len() >= 2)
            .ok_or_else(|| FetchError::malformed(format!("level in '{name}' is too short")))?;
        levels.push(Level {
            price: parse_field_f64(&arr[0], "price")?,
            size: parse_field_f64(&arr[1], "size")?,
        });
    }
    Ok(levels)
}

fn parse_order_book(body: &Value, pair: &str) -> Result<OrderBookSnapshot, FetchError> {
    Ok(OrderBookSnapshot {
        pair: pair.to_string(),
        bids: parse_book_side(&body["bids"], "bids")?,
        asks: parse_book_side(&body["asks"], "asks")?,
    })
}

/// Binance `GET /api/v3/trades` — objects with epoch-ms time and a
/// buyer-is-maker flag.
fn parse_binance_trades(body: &Value) -> Result<Vec<Trade>, FetchError> {
    let rows = body
        .as_array()
        .ok_or_else(|| FetchError::malformed("trades response is not an array"))?;

    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        let ms = row["time"]
            .as_i64()
            .ok_or_else(|| FetchError::malformed("trade time is not an integer"))?;
        let is_buyer_maker = row["isBuyerMaker"]
            .as_bool()
            .ok_or_else(|| FetchError::malformed("trade isBuyerMaker is not a bool"))?;

        trades.push(Trade {
            time: from_epoch_millis(ms).map_err(FetchError::malformed)?,
            price: parse_field_f64(&row["price"], "price")?,
            size: parse_field_f64(&row["qty"], "qty")?,
            // Buyer is maker => the taker was selling.
            side: if is_buyer_maker {
                TradeSide::Sell
            } else {
                TradeSide::Buy
            },
        });
    }
    Ok(trades)
}

/// Coinbase `GET /products/{id}/trades` — objects with ISO time and an
/// explicit side field.
fn parse_coinbase_trades(body: &Value) -> Result<Vec<Trade>, FetchError> {
    let rows = body
        .as_array()
        .ok_or_else(|| FetchError::malformed("trades response is not an array"))?;

    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        let time_str = row["time"]
            .as_str()
            .ok_or_else(|| FetchError::malformed("trade time is not a string"))?;
        let time = NaiveDateTime::parse_from_str(time_str, COINBASE_TIME_FORMAT)
            .map_err(|e| FetchError::malformed(format!("trade time '{time_str}': {e}")))?;

        let side = match row["side"].as_str() {
            Some("buy") => TradeSide::Buy,
            Some("sell") => TradeSide::Sell,
            other => {
                return Err(FetchError::malformed(format!(
                    "unexpected trade side {other:?}"
                )))
            }
        };

        trades.push(Trade {
            time,
            price: parse_field_f64(&row["price"], "price")?,
            size: parse_field_f64(&row["size"], "size")?,
            side,
        });
    }
    Ok(trades)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parse_binance_klines_ok() {
        let body: Value = serde_json::from_str(
            r#"[
                [1704067200000, "42000.0", "42100.5", "41900.0", "42050.0", "12.5",
                 1704067259999, "525625.0", 150, "6.2", "260750.0", "0"],
                [1704067260000, "42050.0", "42200.0", "42000.0", "42150.0", "8.1",
                 1704067319999, "341415.0", 98, "4.0", "168600.0", "0"]
            ]"#,
        )
        .unwrap();

        let candles = parse_binance_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0].time,
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!((candles[0].open - 42000.0).abs() < f64::EPSILON);
        assert!((candles[1].volume - 8.1).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_coinbase_candles_maps_low_high_open_order() {
        // Coinbase: [time, low, high, open, close, volume], newest first.
        let body: Value = serde_json::from_str(
            r#"[
                [1704067260, 41900.0, 42100.0, 42000.0, 42050.0, 3.5],
                [1704067200, 41800.0, 42000.0, 41950.0, 41990.0, 2.0]
            ]"#,
        )
        .unwrap();

        let candles = parse_coinbase_candles(&body).unwrap();
        assert_eq!(candles.len(), 2);
        // Returned order is preserved (newest first) — the fetcher sorts.
        assert!(candles[0].time > candles[1].time);
        assert!((candles[0].open - 42000.0).abs() < f64::EPSILON);
        assert!((candles[0].high - 42100.0).abs() < f64::EPSILON);
        assert!((candles[0].low - 41900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_klines_rejects_short_rows() {
        let body: Value = serde_json::from_str(r#"[[1704067200000, "1.0"]]"#).unwrap();
        let err = parse_binance_klines(&body).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn parse_order_book_both_shapes() {
        // Binance: [price, qty]; Coinbase: [price, size, num_orders].
        let binance: Value = serde_json::from_str(
            r#"{"lastUpdateId": 1, "bids": [["99.0", "1.0"]], "asks": [["101.0", "2.0"]]}"#,
        )
        .unwrap();
        let coinbase: Value = serde_json::from_str(
            r#"{"bids": [["99.0", "1.0", 3]], "asks": [["101.0", "2.0", 1]], "sequence": 5}"#,
        )
        .unwrap();

        for body in [binance, coinbase] {
            let book = parse_order_book(&body, "BTC-USD").unwrap();
            assert_eq!(book.best_bid(), Some(99.0));
            assert_eq!(book.best_ask(), Some(101.0));
        }
    }

    #[test]
    fn parse_binance_trades_maps_taker_side() {
        let body: Value = serde_json::from_str(
            r#"[
                {"id": 1, "price": "42000.0", "qty": "0.5", "time": 1704067200000, "isBuyerMaker": true},
                {"id": 2, "price": "42001.0", "qty": "0.2", "time": 1704067201000, "isBuyerMaker": false}
            ]"#,
        )
        .unwrap();

        let trades = parse_binance_trades(&body).unwrap();
        assert_eq!(trades[0].side, TradeSide::Sell);
        assert_eq!(trades[1].side, TradeSide::Buy);
    }

    #[test]
    fn parse_coinbase_trades_ok() {
        let body: Value = serde_json::from_str(
            r#"[
                {"time": "2024-01-01T00:00:05.123456Z", "trade_id": 7,
                 "price": "42000.0", "size": "0.01", "side": "buy"}
            ]"#,
        )
        .unwrap();

        let trades = parse_coinbase_trades(&body).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert!((trades[0].price - 42000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn string_and_number_floats_both_parse() {
        assert_eq!(parse_field_f64(&Value::from("1.5"), "x").unwrap(), 1.5);
        assert_eq!(parse_field_f64(&Value::from(1.5), "x").unwrap(), 1.5);
        assert!(parse_field_f64(&Value::from("abc"), "x").is_err());
        assert!(parse_field_f64(&Value::Null, "x").is_err());
    }
}
