// =============================================================================
// Order Book Snapshot — single-call passthrough type
// =============================================================================

use serde::{Deserialize, Serialize};

/// One price level: (price, size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// A point-in-time order book snapshot for a single pair.
///
/// Returned unmodified from the exchange's book endpoint: no pagination,
/// no persistence, no retry. Bids are expected best-first (descending
/// price), asks best-first (ascending price).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub pair: String,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Spread in basis points relative to the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        let mid = (bid + ask) / 2.0;
        if mid > 0.0 {
            Some(((ask - bid) / mid) * 10_000.0)
        } else {
            None
        }
    }
}
