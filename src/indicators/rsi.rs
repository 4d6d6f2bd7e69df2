// =============================================================================
// Relative Strength Index (RSI) — simple moving average of gains / losses
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Split each delta into gain = max(d, 0) and loss = max(-d, 0).
// Step 3 — Average the last `period` gains and losses with a plain SMA
//          (rolling window, no Wilder smoothing).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Saturation: avg_loss == 0 with any gain => 100.  A window with no movement
// at all (avg_gain == avg_loss == 0) is defined as 50.
// =============================================================================

/// Compute the rolling RSI series for `closes`.
///
/// Element `i` of the result is the RSI over deltas `i .. i + period`, i.e. it
/// corresponds to close index `i + period`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec
/// - Non-finite results truncate the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    for window in deltas.windows(period) {
        // A NaN delta would silently become a zero gain and a zero loss.
        if window.iter().any(|d| !d.is_finite()) {
            break;
        }

        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

        match rsi_from_averages(sum_gain / period_f, sum_loss / period_f) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

/// Most recent RSI value, or `None` when the series is too short.
///
/// Only the trailing `period + 1` closes are read.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let tail = &closes[closes.len() - (period + 1)..];
    calculate_rsi(tail, period).last().copied()
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: [f64; 32] = [
        44.0, 44.25, 44.5, 43.75, 44.65, 45.12, 45.85, 46.08, 45.89, 46.03, 45.61, 46.28, 46.28,
        46.0, 46.03, 46.41, 46.22, 45.64, 46.21, 46.25, 45.71, 46.45, 45.78, 45.35, 44.03, 44.17,
        44.32, 44.22, 44.57, 43.42, 42.66, 43.13,
    ];

    fn ramp(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| 50.0 + step * i as f64).collect()
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        assert!(calculate_rsi(&[], 14).is_empty());
        assert!(calculate_rsi(&ramp(5, 1.0), 0).is_empty());
        assert!(current_rsi(&ramp(5, 1.0), 0).is_none());
    }

    #[test]
    fn needs_period_plus_one_closes() {
        assert!(calculate_rsi(&ramp(14, 1.0), 14).is_empty());
        assert!(current_rsi(&ramp(14, 1.0), 14).is_none());
        assert_eq!(calculate_rsi(&ramp(15, 1.0), 14).len(), 1);
    }

    #[test]
    fn rsi_fixture_regression() {
        let expected = [
            69.1149, 69.8529, 65.9851, 68.1382, 65.9836, 62.6966, 48.3568, 53.8784, 48.9524,
            43.8628, 37.7329, 32.1489, 33.8284, 34.8639, 38.2258, 28.5509, 26.3926, 33.1090,
        ];
        let series = calculate_rsi(&FIXTURE, 14);
        assert_eq!(series.len(), expected.len());
        for (got, want) in series.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-3, "got {got}, expected {want}");
        }
        let last = current_rsi(&FIXTURE, 14).unwrap();
        assert!((last - 33.1090).abs() < 1e-3);
    }

    #[test]
    fn monotonic_series_hit_the_bounds() {
        let up = calculate_rsi(&ramp(30, 0.5), 14);
        assert_eq!(up.len(), 16);
        assert!(up.iter().all(|&v| v == 100.0));

        let down = calculate_rsi(&ramp(30, -0.5), 14);
        assert!(down.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rsi_saturates_with_flat_steps_and_gains() {
        // Non-negative deltas only, some zero.
        let closes = vec![10.0, 10.0, 11.0, 11.0, 12.0, 12.0, 13.0];
        assert_eq!(current_rsi(&closes, 6), Some(100.0));
    }

    #[test]
    fn flat_series_is_fifty() {
        assert_eq!(current_rsi(&[42.0; 20], 14), Some(50.0));
    }

    #[test]
    fn stays_within_bounds_on_noisy_input() {
        // Deterministic zig-zag with drift.
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + if i % 3 == 0 { -2.5 } else { 1.75 } + i as f64 * 0.05)
            .collect();
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), closes.len() - 14);
        assert!(series.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn oversized_period_is_absent_not_a_panic() {
        assert!(calculate_rsi(&ramp(30, 1.0), usize::MAX).is_empty());
        assert!(current_rsi(&ramp(30, 1.0), usize::MAX).is_none());
    }

    #[test]
    fn rsi_nan_never_leaks() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes[19] = f64::NAN;
        assert!(current_rsi(&closes, 14).is_none());
    }
}
