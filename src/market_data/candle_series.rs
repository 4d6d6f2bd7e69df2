use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::DataUnavailable;
use crate::types::Interval;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single closed OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Composite key that identifies one (symbol, interval) unit of work.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- bounded rolling window, oldest-first
// ---------------------------------------------------------------------------

/// Rolling window of the most recent candles for one (symbol, interval) pair.
///
/// `close_time` is strictly increasing across the window.  Pushing past
/// `capacity` evicts the oldest candle.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    key: SeriesKey,
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleSeries {
    /// Create an empty series retaining at most `capacity` candles.
    pub fn new(key: SeriesKey, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            key,
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a series from an upstream batch (oldest-first).
    ///
    /// An empty batch or one whose close times are not strictly increasing is
    /// reported as [`DataUnavailable`].  When the batch is longer than
    /// `capacity` only the newest candles are kept.
    pub fn from_candles(
        key: SeriesKey,
        capacity: usize,
        candles: impl IntoIterator<Item = Candle>,
    ) -> Result<Self, DataUnavailable> {
        let mut series = Self::new(key, capacity);
        for candle in candles {
            if !series.push(candle) {
                return Err(DataUnavailable::new(
                    series.key.symbol.clone(),
                    series.key.interval,
                    "candle close times are not strictly increasing",
                ));
            }
        }
        if series.is_empty() {
            return Err(DataUnavailable::new(
                series.key.symbol.clone(),
                series.key.interval,
                "empty candle batch",
            ));
        }
        Ok(series)
    }

    /// Append a candle.  Returns `false` (and leaves the window untouched)
    /// when its `close_time` does not advance past the newest candle.
    pub fn push(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.candles.back() {
            if candle.close_time <= last.close_time {
                return false;
            }
        }
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        true
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Close prices, oldest-first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Volumes, oldest-first.
    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
