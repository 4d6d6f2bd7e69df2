// =============================================================================
// Threshold Configuration — classifier thresholds and indicator periods
// =============================================================================
//
// Every mutation goes through `ThresholdConfig::with_update`, which applies
// the change to a copy and validates the whole result, so an invalid update
// never becomes visible to a running scan.
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::market_data::source::MAX_FETCH_LIMIT;
use crate::types::ThresholdProfile;

/// Largest accepted indicator period.  MACD needs `slow + 1` candles and a
/// fetch never returns more than [`MAX_FETCH_LIMIT`].
pub const MAX_PERIOD: usize = MAX_FETCH_LIMIT - 1;

const PERIOD_RANGE: &str = "an integer within [1, 999]";

/// Thresholds and periods read by the indicator engine and classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// RSI strictly below this is oversold (BUY side).
    pub rsi_buy: f64,
    /// RSI strictly above this is overbought (SELL side).  Must exceed
    /// `rsi_buy`.
    pub rsi_sell: f64,
    pub rsi_period: usize,
    pub ema_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Minimum gap between two alerts for the same (symbol, interval).
    pub signal_validity_minutes: f64,
}

impl ThresholdConfig {
    /// Documented defaults for `profile`.
    pub fn for_profile(profile: ThresholdProfile) -> Self {
        let (rsi_buy, rsi_sell) = match profile {
            ThresholdProfile::Classic => (30.0, 70.0),
            ThresholdProfile::Strict => (20.0, 80.0),
        };
        Self {
            rsi_buy,
            rsi_sell,
            rsi_period: 14,
            ema_period: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            signal_validity_minutes: 15.0,
        }
    }

    /// Check every invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (key, value) in [("rsi_buy", self.rsi_buy), ("rsi_sell", self.rsi_sell)] {
            if !(value > 0.0 && value < 100.0) {
                return Err(ValidationError::OutOfRange {
                    key,
                    expected: "within (0, 100)",
                    value,
                });
            }
        }
        if self.rsi_sell <= self.rsi_buy {
            return Err(ValidationError::RsiOrder {
                buy: self.rsi_buy,
                sell: self.rsi_sell,
            });
        }
        for (key, value) in [
            ("rsi_period", self.rsi_period),
            ("ema_period", self.ema_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ] {
            if value == 0 || value > MAX_PERIOD {
                return Err(ValidationError::OutOfRange {
                    key,
                    expected: PERIOD_RANGE,
                    value: value as f64,
                });
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ValidationError::MacdOrder {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }
        if !(self.signal_validity_minutes.is_finite() && self.signal_validity_minutes > 0.0) {
            return Err(ValidationError::OutOfRange {
                key: "signal_validity_minutes",
                expected: "a positive number",
                value: self.signal_validity_minutes,
            });
        }
        Ok(())
    }

    /// Return a validated copy with `key` set to `value`.  `self` is never
    /// modified.
    pub fn with_update(&self, key: ThresholdKey, value: f64) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        match key {
            ThresholdKey::RsiBuy => next.rsi_buy = value,
            ThresholdKey::RsiSell => next.rsi_sell = value,
            ThresholdKey::SignalValidityMinutes => next.signal_validity_minutes = value,
            ThresholdKey::RsiPeriod => next.rsi_period = positive_int(key, value)?,
            ThresholdKey::EmaPeriod => next.ema_period = positive_int(key, value)?,
            ThresholdKey::MacdFast => next.macd_fast = positive_int(key, value)?,
            ThresholdKey::MacdSlow => next.macd_slow = positive_int(key, value)?,
            ThresholdKey::MacdSignal => next.macd_signal = positive_int(key, value)?,
        }
        next.validate()?;
        Ok(next)
    }

    /// Longest lookback any indicator needs (MACD: slow + 1).
    pub fn min_history(&self) -> usize {
        self.macd_slow
            .saturating_add(1)
            .max(self.rsi_period.saturating_add(1))
            .max(self.ema_period)
    }

    /// Debounce window as a chrono duration.
    pub fn validity_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.signal_validity_minutes * 60_000.0).round() as i64)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::for_profile(ThresholdProfile::default())
    }
}

fn positive_int(key: ThresholdKey, value: f64) -> Result<usize, ValidationError> {
    if value.is_finite() && value >= 1.0 && value <= MAX_PERIOD as f64 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(ValidationError::OutOfRange {
            key: key.as_str(),
            expected: PERIOD_RANGE,
            value,
        })
    }
}

// =============================================================================
// ThresholdKey
// =============================================================================

/// Name of a single updatable threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKey {
    RsiBuy,
    RsiSell,
    RsiPeriod,
    EmaPeriod,
    MacdFast,
    MacdSlow,
    MacdSignal,
    SignalValidityMinutes,
}

impl ThresholdKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsiBuy => "rsi_buy",
            Self::RsiSell => "rsi_sell",
            Self::RsiPeriod => "rsi_period",
            Self::EmaPeriod => "ema_period",
            Self::MacdFast => "macd_fast",
            Self::MacdSlow => "macd_slow",
            Self::MacdSignal => "macd_signal",
            Self::SignalValidityMinutes => "signal_validity_minutes",
        }
    }
}

impl std::fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdKey {
    type Err = ValidationError;

    /// Accepts `rsi_buy`, `RSI_BUY` and the short `signal_validity_min`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rsi_buy" => Ok(Self::RsiBuy),
            "rsi_sell" => Ok(Self::RsiSell),
            "rsi_period" => Ok(Self::RsiPeriod),
            "ema_period" => Ok(Self::EmaPeriod),
            "macd_fast" => Ok(Self::MacdFast),
            "macd_slow" => Ok(Self::MacdSlow),
            "macd_signal" => Ok(Self::MacdSignal),
            "signal_validity_minutes" | "signal_validity_min" => Ok(Self::SignalValidityMinutes),
            _ => Err(ValidationError::UnknownThresholdKey(s.to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_have_documented_defaults() {
        let strict = ThresholdConfig::for_profile(ThresholdProfile::Strict);
        assert_eq!((strict.rsi_buy, strict.rsi_sell), (20.0, 80.0));
        let classic = ThresholdConfig::for_profile(ThresholdProfile::Classic);
        assert_eq!((classic.rsi_buy, classic.rsi_sell), (30.0, 70.0));
        for cfg in [strict, classic] {
            assert_eq!(cfg.ema_period, 20);
            assert_eq!((cfg.macd_fast, cfg.macd_slow, cfg.macd_signal), (12, 26, 9));
            assert_eq!(cfg.signal_validity_minutes, 15.0);
            assert!(cfg.validate().is_ok());
        }
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let cfg: ThresholdConfig = serde_json::from_str(r#"{ "rsi_buy": 25.0 }"#).unwrap();
        assert_eq!(cfg.rsi_buy, 25.0);
        assert_eq!(cfg.rsi_sell, 80.0);
        assert_eq!(cfg.macd_slow, 26);
    }

    #[test]
    fn update_applies_valid_value() {
        let cfg = ThresholdConfig::default();
        let next = cfg.with_update(ThresholdKey::RsiBuy, 25.0).unwrap();
        assert_eq!(next.rsi_buy, 25.0);
        assert_eq!(cfg.rsi_buy, 20.0);
    }

    #[test]
    fn update_rejects_inverted_rsi() {
        let cfg = ThresholdConfig::default();
        let err = cfg.with_update(ThresholdKey::RsiSell, 20.0).unwrap_err();
        assert_eq!(err, ValidationError::RsiOrder { buy: 20.0, sell: 20.0 });
    }

    #[test]
    fn update_rejects_out_of_range_rsi() {
        let cfg = ThresholdConfig::default();
        assert!(cfg.with_update(ThresholdKey::RsiBuy, 0.0).is_err());
        assert!(cfg.with_update(ThresholdKey::RsiSell, 100.0).is_err());
        assert!(cfg.with_update(ThresholdKey::RsiBuy, f64::NAN).is_err());
    }

    #[test]
    fn update_rejects_fractional_or_zero_period() {
        let cfg = ThresholdConfig::default();
        assert!(cfg.with_update(ThresholdKey::EmaPeriod, 0.0).is_err());
        assert!(cfg.with_update(ThresholdKey::EmaPeriod, 12.5).is_err());
        assert!(cfg.with_update(ThresholdKey::EmaPeriod, -3.0).is_err());
        assert_eq!(cfg.with_update(ThresholdKey::EmaPeriod, 50.0).unwrap().ema_period, 50);
    }

    #[test]
    fn update_rejects_period_beyond_fetch_window() {
        let cfg = ThresholdConfig::default();
        for key in [ThresholdKey::RsiPeriod, ThresholdKey::EmaPeriod, ThresholdKey::MacdSlow] {
            let err = cfg.with_update(key, 1e20).unwrap_err();
            assert!(matches!(err, ValidationError::OutOfRange { .. }), "{key}: {err:?}");
            assert!(cfg.with_update(key, 5000.0).is_err());
            assert!(cfg.with_update(key, 1000.0).is_err());
        }

        let widest = cfg.with_update(ThresholdKey::MacdSlow, 999.0).unwrap();
        assert_eq!(widest.min_history(), MAX_FETCH_LIMIT);
    }

    #[test]
    fn stored_config_with_huge_period_fails_validation() {
        let cfg: ThresholdConfig =
            serde_json::from_str(r#"{ "rsi_period": 18446744073709551615 }"#).unwrap();
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.min_history(), usize::MAX);
    }

    #[test]
    fn update_rejects_macd_fast_not_below_slow() {
        let cfg = ThresholdConfig::default();
        let err = cfg.with_update(ThresholdKey::MacdFast, 26.0).unwrap_err();
        assert_eq!(err, ValidationError::MacdOrder { fast: 26, slow: 26 });
    }

    #[test]
    fn update_rejects_non_positive_validity() {
        let cfg = ThresholdConfig::default();
        assert!(cfg.with_update(ThresholdKey::SignalValidityMinutes, 0.0).is_err());
        assert!(cfg.with_update(ThresholdKey::SignalValidityMinutes, 0.5).is_ok());
    }

    #[test]
    fn key_parsing_accepts_legacy_names() {
        assert_eq!("RSI_BUY".parse::<ThresholdKey>().unwrap(), ThresholdKey::RsiBuy);
        assert_eq!(
            "signal_validity_min".parse::<ThresholdKey>().unwrap(),
            ThresholdKey::SignalValidityMinutes
        );
        assert!("VOLUME_MULT".parse::<ThresholdKey>().is_err());
    }

    #[test]
    fn validity_window_and_min_history() {
        let cfg = ThresholdConfig::default();
        assert_eq!(cfg.validity_window(), chrono::Duration::minutes(15));
        assert_eq!(cfg.min_history(), 27);
    }
}
