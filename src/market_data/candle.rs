// =============================================================================
// Candle — canonical OHLCV record
// =============================================================================

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical timestamp format used in the store and in status output.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single OHLCV candle, timestamped at bucket start (UTC).
///
/// Exchange-native encodings (epoch millis, epoch seconds, string-encoded
/// floats, nested arrays) are normalized into this shape at the client
/// boundary before anything downstream sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        time: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Render the bucket-start timestamp in canonical form.
    pub fn time_string(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

/// Parse a canonical `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT)
        .with_context(|| format!("failed to parse timestamp '{s}'"))
}

/// Convert an exchange epoch-millisecond timestamp to a candle timestamp.
pub fn from_epoch_millis(ms: i64) -> Result<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .with_context(|| format!("epoch millis {ms} out of range"))
}

/// Convert an exchange epoch-second timestamp to a candle timestamp.
pub fn from_epoch_secs(secs: i64) -> Result<NaiveDateTime> {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .with_context(|| format!("epoch seconds {secs} out of range"))
}

/// Sort candles ascending by timestamp.
///
/// Exchanges disagree on page ordering (Coinbase returns newest-first,
/// Binance oldest-first), so every page is sorted before it is persisted.
pub fn normalize(candles: &mut [Candle]) {
    candles.sort_by_key(|c| c.time);
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn candle(t: NaiveDateTime) -> Candle {
        Candle::new(t, 1.0, 2.0, 0.5, 1.5, 10.0)
    }

    #[test]
    fn timestamp_roundtrip() {
        let t = ts(0, 59);
        let c = candle(t);
        assert_eq!(c.time_string(), "2024-01-01 00:59:00");
        assert_eq!(parse_timestamp(&c.time_string()).unwrap(), t);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_timestamp("not a time").is_err());
        assert!(parse_timestamp("2024-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn epoch_conversions_agree() {
        // 2024-01-01 00:00:00 UTC
        let t = from_epoch_secs(1_704_067_200).unwrap();
        assert_eq!(t, ts(0, 0));
        assert_eq!(from_epoch_millis(1_704_067_200_000).unwrap(), t);
    }

    #[test]
    fn normalize_sorts_descending_input() {
        let mut page = vec![candle(ts(0, 3)), candle(ts(0, 1)), candle(ts(0, 2))];
        normalize(&mut page);
        let times: Vec<_> = page.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![ts(0, 1), ts(0, 2), ts(0, 3)]);
    }
}
