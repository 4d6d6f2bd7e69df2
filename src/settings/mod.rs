// =============================================================================
// Settings Module
// =============================================================================
//
// Hot-reloadable scanner settings: classifier thresholds, the watch-list with
// its per-symbol intervals, and the mute-set.  All mutations go through
// `SettingsService`.

pub mod service;
pub mod thresholds;
pub mod watchlist;

pub use service::{ScannerSettings, SettingsService};
pub use thresholds::{ThresholdConfig, ThresholdKey};
pub use watchlist::{normalize_symbol, MuteSet, WatchList};
