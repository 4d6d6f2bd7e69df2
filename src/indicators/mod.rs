// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the classifier
// reads.  Every public function returns `Option<T>` (or an empty `Vec`) so
// callers are forced to handle insufficient data instead of reading zeros.
// Each indicator is evaluable on its own.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod volume;

pub use snapshot::IndicatorSnapshot;
