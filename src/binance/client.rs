// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unauthenticated endpoints are used (klines, 24h ticker), so no API key
// or signature is ever sent.  Every response feeds the rate-limit tracker;
// once the tracked weight would cross the hard ceiling further requests are
// refused locally until the minute rolls over.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::error::DataUnavailable;
use crate::market_data::{
    Candle, CandleSeries, MarketDataSource, MarketOverview, SeriesKey, Ticker24h,
};
use crate::types::Interval;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Request weight of a single-symbol klines call.
const KLINES_WEIGHT: u32 = 2;
/// Request weight of the all-symbols 24h ticker call.
const TICKER_24H_ALL_WEIGHT: u32 = 80;

/// Binance public REST client.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    /// Create a client against `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let path = format!(
            "/api/v3/klines?symbol={}&interval={}&limit={}",
            symbol, interval, limit
        );
        let body = self.get_json(&path, KLINES_WEIGHT).await?;
        let candles = parse_klines(&body)?;

        debug!(symbol, %interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /api/v3/ticker/24hr for every symbol.
    #[instrument(skip(self), name = "binance::get_24h_tickers")]
    pub async fn get_24h_tickers(&self) -> Result<Vec<Ticker24h>> {
        let body = self
            .get_json("/api/v3/ticker/24hr", TICKER_24H_ALL_WEIGHT)
            .await?;
        let tickers = parse_tickers(&body)?;
        debug!(count = tickers.len(), "24h tickers fetched");
        Ok(tickers)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    async fn get_json(&self, path: &str, weight: u32) -> Result<serde_json::Value> {
        if !self.rate_limit.can_send_request(weight, now_ms()) {
            anyhow::bail!("local rate-limit ceiling reached, request to {path} not sent");
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        self.rate_limit.update_from_headers(resp.headers(), now_ms());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            anyhow::bail!("Binance GET {path} returned {status}: {body}");
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, DataUnavailable> {
        let candles = self
            .get_klines(symbol, interval, limit)
            .await
            .map_err(|e| DataUnavailable::new(symbol, interval, format!("{e:#}")))?;
        CandleSeries::from_candles(SeriesKey::new(symbol, interval), limit, candles)
    }
}

#[async_trait]
impl MarketOverview for BinanceClient {
    async fn top_movers(&self, n: usize) -> Result<Vec<Ticker24h>> {
        Ok(rank_movers(self.get_24h_tickers().await?, n))
    }

    fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        Some(self.rate_limit.snapshot(now_ms()))
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Response parsing
// =============================================================================

/// Parse Binance's array-of-arrays klines payload.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline openTime is not an integer")?;
        let open = parse_str_f64(&arr[1])?;
        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;
        let volume = parse_str_f64(&arr[5])?;
        let close_time = arr[6].as_i64().context("kline closeTime is not an integer")?;

        candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
    }
    Ok(candles)
}

fn parse_tickers(body: &serde_json::Value) -> Result<Vec<Ticker24h>> {
    let raw = body.as_array().context("ticker response is not an array")?;
    raw.iter()
        .map(|t| {
            Ok(Ticker24h {
                symbol: t["symbol"]
                    .as_str()
                    .context("ticker entry missing 'symbol'")?
                    .to_string(),
                last_price: parse_str_f64(&t["lastPrice"])?,
                price_change_percent: parse_str_f64(&t["priceChangePercent"])?,
                quote_volume: parse_str_f64(&t["quoteVolume"])?,
            })
        })
        .collect()
}

/// Sort by 24h change (descending) and keep the first `n`.
pub fn rank_movers(mut tickers: Vec<Ticker24h>, n: usize) -> Vec<Ticker24h> {
    tickers.retain(|t| t.price_change_percent.is_finite());
    tickers.sort_by(|a, b| b.price_change_percent.total_cmp(&a.price_change_percent));
    tickers.truncate(n);
    tickers
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_klines_payload() {
        let body = json!([
            [1_700_000_000_000i64, "100.0", "101.5", "99.5", "101.0", "12.5", 1_700_000_899_999i64, "1262.5", 42, "6.0", "606.0", "0"],
            [1_700_000_900_000i64, "101.0", "102.0", "100.0", "100.5", "8", 1_700_001_799_999i64, "804", 30, "4", "402", "0"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[1].volume, 8.0);
        assert_eq!(candles[1].close_time, 1_700_001_799_999);
    }

    #[test]
    fn short_entries_are_skipped() {
        let body = json!([[1, "1", "1", "1", "1"]]);
        assert!(parse_klines(&body).unwrap().is_empty());
    }

    #[test]
    fn error_payloads_are_rejected() {
        assert!(parse_klines(&json!({"code": -1121, "msg": "Invalid symbol."})).is_err());
        let bad_price = json!([[1, "x", "1", "1", "1", "1", 2]]);
        assert!(parse_klines(&bad_price).is_err());
    }

    #[test]
    fn ranks_top_movers() {
        let body = json!([
            {"symbol": "AAAUSDT", "lastPrice": "1.0", "priceChangePercent": "-3.5", "quoteVolume": "10"},
            {"symbol": "BBBUSDT", "lastPrice": "2.0", "priceChangePercent": "12.25", "quoteVolume": "20"},
            {"symbol": "CCCUSDT", "lastPrice": "3.0", "priceChangePercent": "4.0", "quoteVolume": "30"}
        ]);
        let tickers = parse_tickers(&body).unwrap();
        let top = rank_movers(tickers, 2);
        let symbols: Vec<_> = top.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, ["BBBUSDT", "CCCUSDT"]);
    }

    #[test]
    fn debug_shows_base_url() {
        let client = BinanceClient::new("https://example.test/", Duration::from_secs(5)).unwrap();
        let dbg = format!("{client:?}");
        assert!(dbg.contains("https://example.test"));
        assert!(!dbg.contains("example.test/\""));
    }
}
