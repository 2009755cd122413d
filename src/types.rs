// =============================================================================
// Shared types used across the Vela market archiver
// =============================================================================

use std::str::FromStr;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};

/// A currency pair, e.g. `LINK-USDT`.
///
/// Accepted input forms are `BASE-QUOTE` and `BASE/QUOTE` in any case; the
/// pair is stored uppercased. Each exchange wants its own rendering, so the
/// accessors return the dashed (`LINK-USDT`), slashed (`LINK/USDT`) and
/// concatenated (`LINKUSDT`) forms.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    /// `LINK-USDT` — Coinbase product-id form.
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }

    /// `LINK/USDT` — display form.
    pub fn slashed(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// `LINKUSDT` — Binance symbol form.
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// `link-usdt` — used to derive the store file name.
    pub fn file_stem(&self) -> String {
        self.dashed().to_lowercase()
    }
}

impl FromStr for Pair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once(['-', '/'])
            .ok_or_else(|| anyhow::anyhow!("pair '{s}' is not in BASE-QUOTE form"))?;

        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();

        if base.is_empty()
            || quote.is_empty()
            || !base.chars().all(|c| c.is_ascii_alphanumeric())
            || !quote.chars().all(|c| c.is_ascii_alphanumeric())
        {
            anyhow::bail!("pair '{s}' contains an empty or non-alphanumeric leg");
        }

        Ok(Self { base, quote })
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Candle bucket duration.
///
/// Restricted to the buckets every supported exchange accepts (Coinbase Pro
/// only serves these six granularities; Binance serves a superset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl Granularity {
    /// Bucket duration in seconds.
    pub fn secs(self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::OneHour => 3_600,
            Self::SixHours => 21_600,
            Self::OneDay => 86_400,
        }
    }

    /// Interval label in the form exchanges use, e.g. `1m`, `1h`.
    pub fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::OneDay => "1d",
        }
    }

    /// One bucket as a chrono duration (the resume/pagination step).
    pub fn step(self) -> ChronoDuration {
        ChronoDuration::seconds(self.secs())
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::OneMinute
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the interval label ("1m") and raw seconds ("60").
        match s.trim() {
            "1m" | "60" => Ok(Self::OneMinute),
            "5m" | "300" => Ok(Self::FiveMinutes),
            "15m" | "900" => Ok(Self::FifteenMinutes),
            "1h" | "3600" => Ok(Self::OneHour),
            "6h" | "21600" => Ok(Self::SixHours),
            "1d" | "86400" => Ok(Self::OneDay),
            other => anyhow::bail!(
                "unsupported granularity '{other}' (expected 1m/5m/15m/1h/6h/1d or seconds)"
            ),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which job the process runs on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Incremental candle-history fetch into the CSV store (the default).
    History,
    /// Print a single order-book snapshot per pair.
    Book,
    /// Print recent trades per pair.
    Trades,
    /// Print the last-price ticker per pair.
    Ticker,
}

impl Default for JobKind {
    fn default() -> Self {
        Self::History
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "history" => Ok(Self::History),
            "book" => Ok(Self::Book),
            "trades" => Ok(Self::Trades),
            "ticker" => Ok(Self::Ticker),
            other => anyhow::bail!("unknown job '{other}' (expected history/book/trades/ticker)"),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::History => write!(f, "history"),
            Self::Book => write!(f, "book"),
            Self::Trades => write!(f, "trades"),
            Self::Ticker => write!(f, "ticker"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_parses_dashed_and_slashed() {
        let a: Pair = "link-usdt".parse().unwrap();
        let b: Pair = "LINK/USDT".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dashed(), "LINK-USDT");
        assert_eq!(a.concatenated(), "LINKUSDT");
        assert_eq!(a.slashed(), "LINK/USDT");
        assert_eq!(a.file_stem(), "link-usdt");
    }

    #[test]
    fn pair_rejects_malformed_input() {
        assert!("BTCUSDT".parse::<Pair>().is_err());
        assert!("-USDT".parse::<Pair>().is_err());
        assert!("BTC-".parse::<Pair>().is_err());
        assert!("BTC-US DT".parse::<Pair>().is_err());
    }

    #[test]
    fn granularity_parses_labels_and_seconds() {
        assert_eq!("1m".parse::<Granularity>().unwrap(), Granularity::OneMinute);
        assert_eq!(
            "300".parse::<Granularity>().unwrap(),
            Granularity::FiveMinutes
        );
        assert_eq!("1d".parse::<Granularity>().unwrap(), Granularity::OneDay);
        assert!("42s".parse::<Granularity>().is_err());
    }

    #[test]
    fn granularity_step_matches_seconds() {
        assert_eq!(Granularity::OneHour.secs(), 3_600);
        assert_eq!(Granularity::OneHour.step().num_seconds(), 3_600);
        assert_eq!(Granularity::OneMinute.label(), "1m");
    }

    #[test]
    fn job_kind_defaults_to_history() {
        assert_eq!(JobKind::default(), JobKind::History);
        assert_eq!("BOOK".parse::<JobKind>().unwrap(), JobKind::Book);
    }
}
