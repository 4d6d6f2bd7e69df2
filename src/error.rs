// =============================================================================
// Error taxonomy
// =============================================================================
//
// Nothing in this taxonomy is fatal.  `DataUnavailable` and
// `InsufficientHistory` skip a single (symbol, interval) unit for one tick,
// `ValidationError` rejects a config mutation, `NotifierFailure` is logged
// and otherwise ignored.
// =============================================================================

use thiserror::Error;

use crate::types::Interval;

/// Upstream market data was missing, malformed or refused.
#[derive(Debug, Clone, Error)]
#[error("data unavailable for {symbol}@{interval}: {reason}")]
pub struct DataUnavailable {
    pub symbol: String,
    pub interval: Interval,
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(symbol: impl Into<String>, interval: Interval, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            reason: reason.into(),
        }
    }
}

/// The series is shorter than at least one indicator's lookback.
#[derive(Debug, Clone, Error)]
#[error("insufficient history for {symbol}@{interval}: {len} candles, missing {missing:?}")]
pub struct InsufficientHistory {
    pub symbol: String,
    pub interval: Interval,
    pub len: usize,
    pub missing: Vec<&'static str>,
}

/// A config mutation violated an invariant.  State is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid symbol '{0}': expected uppercase alphanumeric")]
    InvalidSymbol(String),

    #[error("{0} is already on the watch-list")]
    DuplicateSymbol(String),

    #[error("{0} is not on the watch-list")]
    UnknownSymbol(String),

    #[error("unknown interval '{0}'")]
    UnknownInterval(String),

    #[error("interval list for {0} must not be empty")]
    EmptyIntervals(String),

    #[error("unknown threshold key '{0}'")]
    UnknownThresholdKey(String),

    #[error("unknown threshold profile '{0}'")]
    UnknownProfile(String),

    #[error("{key} must be {expected}, got {value}")]
    OutOfRange {
        key: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("rsi_sell ({sell}) must be greater than rsi_buy ({buy})")]
    RsiOrder { buy: f64, sell: f64 },

    #[error("macd_fast ({fast}) must be less than macd_slow ({slow})")]
    MacdOrder { fast: usize, slow: usize },
}

/// Delivery of an alert failed.
#[derive(Debug, Clone, Error)]
#[error("notifier '{notifier}' failed: {reason}")]
pub struct NotifierFailure {
    pub notifier: &'static str,
    pub reason: String,
}

/// Failure of an inbound settings operation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist '{key}': {source}")]
    Persistence {
        key: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Why a single (symbol, interval) unit produced no verdict this tick.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    #[error(transparent)]
    DataUnavailable(#[from] DataUnavailable),

    #[error("fetch for {symbol}@{interval} timed out after {secs}s")]
    Timeout {
        symbol: String,
        interval: Interval,
        secs: u64,
    },
}
