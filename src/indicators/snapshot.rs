// =============================================================================
// Indicator Snapshot — every value the classifier reads, computed once
// =============================================================================

use serde::Serialize;

use super::{ema, macd, rsi, volume};
use crate::error::InsufficientHistory;
use crate::market_data::CandleSeries;
use crate::settings::ThresholdConfig;

/// Immutable per-evaluation indicator values.
///
/// `None` means the series was shorter than that indicator's lookback.  It is
/// never replaced by zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub ema_last: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub last_close: f64,
    pub last_volume: f64,
    pub avg_volume: f64,
    pub candles: usize,
}

impl IndicatorSnapshot {
    /// Compute all indicators for `series`.  `None` for an empty series.
    pub fn from_series(series: &CandleSeries, thresholds: &ThresholdConfig) -> Option<Self> {
        let last = series.last()?;
        let closes = series.closes();
        let volumes = series.volumes();

        let macd = macd::calculate_macd(
            &closes,
            thresholds.macd_fast,
            thresholds.macd_slow,
            thresholds.macd_signal,
        );

        Some(Self {
            rsi: rsi::current_rsi(&closes, thresholds.rsi_period),
            ema_last: ema::current_ema(&closes, thresholds.ema_period),
            macd_line: macd.map(|m| m.macd_line),
            macd_signal: macd.map(|m| m.signal_line),
            last_close: last.close,
            last_volume: last.volume,
            avg_volume: volume::average_volume(&volumes).unwrap_or(last.volume),
            candles: series.len(),
        })
    }

    /// Names of the indicators that could not be computed.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.rsi.is_none() {
            missing.push("rsi");
        }
        if self.ema_last.is_none() {
            missing.push("ema");
        }
        if self.macd_line.is_none() || self.macd_signal.is_none() {
            missing.push("macd");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Describe an incomplete snapshot as [`InsufficientHistory`].
    pub fn insufficient_history(&self, series: &CandleSeries) -> Option<InsufficientHistory> {
        let missing = self.missing();
        if missing.is_empty() {
            return None;
        }
        Some(InsufficientHistory {
            symbol: series.key().symbol.clone(),
            interval: series.key().interval,
            len: self.candles,
            missing,
        })
    }
}
