// =============================================================================
// Exchange Registry — static identifier → profile mapping
// =============================================================================
//
// Each supported exchange is a tagged variant resolved from its config
// name at startup; an unknown name is a construction-time error. The
// profile carries the per-exchange request constraints the fetch loop
// needs: batch ceiling, mandated inter-request delay, and base URL.
// =============================================================================

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coinbase Pro caps candle responses at 300 rows per request.
const COINBASE_MAX_CANDLES: u32 = 300;
/// Binance caps kline responses at 1000 rows per request.
const BINANCE_MAX_CANDLES: u32 = 1000;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    #[serde(rename = "coinbasepro")]
    CoinbasePro,
    Binance,
}

impl ExchangeId {
    /// Config / file-name identifier.
    pub fn name(self) -> &'static str {
        match self {
            Self::CoinbasePro => "coinbasepro",
            Self::Binance => "binance",
        }
    }

    /// Request constraints and endpoint root for this exchange.
    pub fn profile(self) -> ExchangeProfile {
        match self {
            Self::CoinbasePro => ExchangeProfile {
                id: self,
                base_url: "https://api.exchange.coinbase.com".to_string(),
                max_candles_per_request: COINBASE_MAX_CANDLES,
                rate_limit_interval: Duration::from_millis(500),
            },
            Self::Binance => ExchangeProfile {
                id: self,
                base_url: "https://api.binance.com".to_string(),
                max_candles_per_request: BINANCE_MAX_CANDLES,
                rate_limit_interval: Duration::from_millis(200),
            },
        }
    }
}

impl FromStr for ExchangeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coinbasepro" | "coinbase" => Ok(Self::CoinbasePro),
            "binance" => Ok(Self::Binance),
            other => anyhow::bail!("unknown exchange '{other}' (expected coinbasepro or binance)"),
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-exchange request constraints.
#[derive(Debug, Clone)]
pub struct ExchangeProfile {
    pub id: ExchangeId,
    pub base_url: String,
    /// Maximum candles the exchange returns per request.
    pub max_candles_per_request: u32,
    /// Mandated pause between consecutive requests.
    pub rate_limit_interval: Duration,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_exchanges_resolve() {
        assert_eq!(
            "coinbasepro".parse::<ExchangeId>().unwrap(),
            ExchangeId::CoinbasePro
        );
        assert_eq!("Binance".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
    }

    #[test]
    fn unknown_exchange_is_an_error() {
        assert!("kraken".parse::<ExchangeId>().is_err());
        assert!("".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn batch_ceilings_match_exchange_documentation() {
        assert_eq!(
            ExchangeId::CoinbasePro.profile().max_candles_per_request,
            300
        );
        assert_eq!(ExchangeId::Binance.profile().max_candles_per_request, 1000);
    }

    #[test]
    fn profile_name_roundtrips() {
        for id in [ExchangeId::CoinbasePro, ExchangeId::Binance] {
            assert_eq!(id.name().parse::<ExchangeId>().unwrap(), id);
        }
    }
}
