// =============================================================================
// Signals Module
// =============================================================================
//
// Verdict pipeline for one (symbol, interval) unit:
// - Composite classifier (RSI / MACD / EMA / volume)
// - Debounce store gating repeated alerts
// - Alert record handed to the notifier

pub mod alert;
pub mod classifier;
pub mod debounce;

pub use alert::Alert;
pub use classifier::{classify, Bias, Classification, Conditions, Rationale, RsiZone};
pub use debounce::{AlertDebounceStore, DebounceEntry};
