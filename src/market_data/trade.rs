// =============================================================================
// Trade & Ticker — single-call passthrough types
// =============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Side of the taker in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A single executed trade from the exchange's recent-trades endpoint,
/// returned unmodified (no windowing, no persistence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub time: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
}

/// Last-price snapshot for a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    pub price: f64,
}
