// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The recursion is seeded with the first close (no SMA warm-up), so the output
// has exactly one value per input close.
// =============================================================================

/// Compute the EMA series for `closes` with look-back `period`.
///
/// Returns an empty `Vec` when `period == 0` or `closes.len() < period`.
/// Otherwise the output has the same length as the input.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    smooth(closes, period)
}

/// Last EMA value, or `None` when the series is shorter than `period` or the
/// recursion produced a non-finite value.
pub fn current_ema(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period)
        .last()
        .copied()
        .filter(|v| v.is_finite())
}

/// EMA recursion without the length guard.  MACD needs the signal-line EMA
/// over the full MACD series even when it is only marginally longer than the
/// signal period.
pub(crate) fn smooth(values: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    if period == 0 {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = first;
    result.push(prev);

    for &value in &values[1..] {
        let ema = value * multiplier + prev * (1.0 - multiplier);
        result.push(ema);
        prev = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
        assert!(current_ema(&[1.0, 2.0], 5).is_none());
    }

    #[test]
    fn ema_period_one_is_identity() {
        let closes = vec![3.0, 7.5, 1.25, 9.0, 4.0];
        assert_eq!(calculate_ema(&closes, 1), closes);
    }

    #[test]
    fn ema_seeded_with_first_value() {
        let closes = vec![2.0, 4.0, 6.0];
        let ema = calculate_ema(&closes, 3);
        assert_eq!(ema.len(), 3);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        // multiplier 0.5: 0.5*4 + 0.5*2 = 3, 0.5*6 + 0.5*3 = 4.5
        assert!((ema[1] - 3.0).abs() < 1e-12);
        assert!((ema[2] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn ema_known_values() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 10);

        let mult = 2.0 / 6.0;
        let mut expected = 1.0;
        for (i, &c) in closes.iter().enumerate().skip(1) {
            expected = c * mult + expected * (1.0 - mult);
            assert!((ema[i] - expected).abs() < 1e-10, "got {}, expected {expected}", ema[i]);
        }
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let closes = vec![42.0; 50];
        assert!((current_ema(&closes, 20).unwrap() - 42.0).abs() < 1e-12);
    }

    #[test]
    fn current_ema_rejects_nan() {
        let closes = vec![1.0, 2.0, 3.0, f64::NAN, 5.0];
        assert!(current_ema(&closes, 3).is_none());
    }
}
