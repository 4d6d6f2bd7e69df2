// =============================================================================
// Binance Module — public REST market data and rate-limit accounting
// =============================================================================

pub mod client;
pub mod rate_limit;

pub use client::{BinanceClient, DEFAULT_BASE_URL};
