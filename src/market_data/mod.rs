pub mod candle_series;
pub mod source;

// Re-export the series types for convenient access (e.g. `use crate::market_data::CandleSeries`).
pub use candle_series::{Candle, CandleSeries, SeriesKey};
pub use source::{clamp_limit, MarketDataSource, MarketOverview, Ticker24h};
