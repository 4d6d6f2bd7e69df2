// =============================================================================
// Market data boundary
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;

use crate::binance::rate_limit::RateLimitSnapshot;
use crate::error::DataUnavailable;
use crate::market_data::CandleSeries;
use crate::types::Interval;

/// Upper bound Binance accepts for `limit` on the klines endpoint.
pub const MAX_FETCH_LIMIT: usize = 1000;

/// Fetches a bounded window of the most recent candles.
///
/// Implementations never retry; the scanner decides what a failure means for
/// the current tick.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, DataUnavailable>;
}

/// One row of a 24h ticker, reduced to what the scanner shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: f64,
    pub price_change_percent: f64,
    pub quote_volume: f64,
}

/// Exchange-wide market view used by the control API.
#[async_trait]
pub trait MarketOverview: Send + Sync {
    /// The `n` symbols with the largest 24h price change, biggest first.
    async fn top_movers(&self, n: usize) -> anyhow::Result<Vec<Ticker24h>>;

    /// Upstream request-weight usage, when the source tracks it.
    fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        None
    }
}

/// Clamp a requested window so it covers the slowest lookback and stays under
/// the upstream maximum.
pub fn clamp_limit(requested: usize, min_lookback: usize) -> usize {
    requested.max(min_lookback).min(MAX_FETCH_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(10, 27), 27);
        assert_eq!(clamp_limit(200, 27), 200);
        assert_eq!(clamp_limit(5000, 27), MAX_FETCH_LIMIT);
    }
}
