// =============================================================================
// Signal Classifier — composite RSI / MACD / EMA / volume verdict
// =============================================================================
//
// BUY  iff rsi < rsi_buy  && macd > signal && close > ema && volume > avg
// SELL iff rsi > rsi_sell && macd < signal && close < ema && volume > avg
// NEUTRAL otherwise, and always when any indicator is absent.
//
// BUY and SELL cannot both hold: they require opposite RSI sides (rsi_sell >
// rsi_buy is a config invariant) and opposite MACD comparisons.
// =============================================================================

use serde::Serialize;

use crate::indicators::IndicatorSnapshot;
use crate::settings::ThresholdConfig;
use crate::types::Signal;

/// Last volume above this multiple of the average is reported as a spike.
const VOLUME_SPIKE_RATIO: f64 = 1.2;

/// Which side of the RSI thresholds the current value sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

/// Direction of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
}

/// Outcome of each condition for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Conditions {
    pub rsi: bool,
    pub macd: bool,
    pub ema: bool,
    pub volume: bool,
}

impl Conditions {
    pub fn all(&self) -> bool {
        self.rsi && self.macd && self.ema && self.volume
    }
}

/// Values and intermediate outcomes behind a verdict, for display and audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rationale {
    pub snapshot: IndicatorSnapshot,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub missing: Vec<&'static str>,
    pub buy: Conditions,
    pub sell: Conditions,
    pub rsi_zone: Option<RsiZone>,
    pub macd_bias: Option<Bias>,
    pub price_vs_ema: Option<Bias>,
    pub volume_spike: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub signal: Signal,
    pub rationale: Rationale,
}

impl Classification {
    /// True when the verdict is NEUTRAL only because data was missing.
    pub fn is_insufficient(&self) -> bool {
        !self.rationale.missing.is_empty()
    }
}

/// Classify `snapshot` against `thresholds`.
pub fn classify(snapshot: &IndicatorSnapshot, thresholds: &ThresholdConfig) -> Classification {
    let missing = snapshot.missing();
    let volume_above = snapshot.last_volume > snapshot.avg_volume;

    let rsi_zone = snapshot.rsi.map(|rsi| {
        if rsi < thresholds.rsi_buy {
            RsiZone::Oversold
        } else if rsi > thresholds.rsi_sell {
            RsiZone::Overbought
        } else {
            RsiZone::Neutral
        }
    });

    let macd_bias = match (snapshot.macd_line, snapshot.macd_signal) {
        (Some(line), Some(signal)) => compare(line, signal),
        _ => None,
    };
    let price_vs_ema = snapshot.ema_last.and_then(|ema| compare(snapshot.last_close, ema));

    let buy = Conditions {
        rsi: rsi_zone == Some(RsiZone::Oversold),
        macd: macd_bias == Some(Bias::Bullish),
        ema: price_vs_ema == Some(Bias::Bullish),
        volume: volume_above,
    };
    let sell = Conditions {
        rsi: rsi_zone == Some(RsiZone::Overbought),
        macd: macd_bias == Some(Bias::Bearish),
        ema: price_vs_ema == Some(Bias::Bearish),
        volume: volume_above,
    };

    let is_buy = missing.is_empty() && buy.all();
    let is_sell = missing.is_empty() && sell.all();
    debug_assert!(!(is_buy && is_sell), "BUY and SELL must be mutually exclusive");

    let signal = if is_buy {
        Signal::Buy
    } else if is_sell {
        Signal::Sell
    } else {
        Signal::Neutral
    };

    Classification {
        signal,
        rationale: Rationale {
            snapshot: snapshot.clone(),
            rsi_buy: thresholds.rsi_buy,
            rsi_sell: thresholds.rsi_sell,
            missing,
            buy,
            sell,
            rsi_zone,
            macd_bias,
            price_vs_ema,
            volume_spike: snapshot.last_volume > snapshot.avg_volume * VOLUME_SPIKE_RATIO,
        },
    }
}

/// Strict comparison; equal values carry no bias.
fn compare(a: f64, b: f64) -> Option<Bias> {
    if a > b {
        Some(Bias::Bullish)
    } else if a < b {
        Some(Bias::Bearish)
    } else {
        None
    }
}
