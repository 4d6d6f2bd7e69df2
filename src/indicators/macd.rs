// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   macd_line   = EMA(close, fast) - EMA(close, slow)
//   signal_line = EMA(macd_line, signal)
//   histogram   = macd_line - signal_line
//
// All EMAs are seeded with their first input value (see `ema::smooth`).
// =============================================================================

use serde::Serialize;

use super::ema::smooth;

/// Latest MACD values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdResult {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Full MACD line and signal line series (same length as the input).
///
/// Returns `None` when the periods are degenerate (`fast == 0`,
/// `signal == 0`, `fast >= slow`) or `closes.len() < slow + 1`.
pub fn calculate_macd_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<(Vec<f64>, Vec<f64>)> {
    if fast == 0 || signal == 0 || fast >= slow || closes.len() <= slow {
        return None;
    }

    let fast_ema = smooth(closes, fast);
    let slow_ema = smooth(closes, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = smooth(&macd_line, signal);

    Some((macd_line, signal_line))
}

/// Most recent MACD line, signal line and histogram.
///
/// `None` on insufficient data or when the latest values are non-finite.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdResult> {
    let (macd_line, signal_line) = calculate_macd_series(closes, fast, slow, signal)?;
    let macd_line = *macd_line.last()?;
    let signal_line = *signal_line.last()?;

    if !macd_line.is_finite() || !signal_line.is_finite() {
        return None;
    }

    Some(MacdResult {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    })
}
