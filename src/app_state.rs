// =============================================================================
// Central Application State — Signal Scanner
// =============================================================================
//
// Ties the long-lived components together for the control API: settings,
// scheduler (and through it the scan engine and debounce store), the alert
// log and the exchange-wide market view.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the error ring buffer.
//   - Components manage their own interior mutability behind Arc.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::binance::rate_limit::RateLimitSnapshot;
use crate::market_data::MarketOverview;
use crate::notifier::AlertLog;
use crate::runtime_config::EngineConfig;
use crate::scanner::{ScanScheduler, TickReport};
use crate::settings::{SettingsService, ThresholdConfig};
use crate::types::{Interval, ScannerState, ThresholdProfile};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the state endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    /// Bumped on every state-changing API call.
    state_version: AtomicU64,

    pub config: EngineConfig,
    pub settings: Arc<SettingsService>,
    pub scheduler: Arc<ScanScheduler>,
    pub alert_log: Arc<AlertLog>,
    pub market: Arc<dyn MarketOverview>,

    recent_errors: RwLock<Vec<ErrorRecord>>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        settings: Arc<SettingsService>,
        scheduler: Arc<ScanScheduler>,
        alert_log: Arc<AlertLog>,
        market: Arc<dyn MarketOverview>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config,
            settings,
            scheduler,
            alert_log,
            market,
            recent_errors: RwLock::new(Vec::new()),
        }
    }

    // ── Versioning ──────────────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Relaxed)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message.  Oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable view of everything the scanner is configured to do and
    /// what its last tick did.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let settings = self.settings.snapshot();

        let symbols = settings
            .watchlist
            .symbols()
            .iter()
            .map(|s| WatchedSymbol {
                symbol: s.clone(),
                intervals: settings.watchlist.intervals_for(s),
                muted: settings.muted.is_muted(s),
            })
            .collect();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            scanner_state: self.scheduler.state(),
            scan_period_secs: self.config.scan_period_secs,
            profile: self.settings.profile(),
            thresholds: settings.thresholds,
            watchlist: symbols,
            muted: settings.muted.iter().cloned().collect(),
            fallback_symbols: self.config.fallback_symbols.clone(),
            debounce_records: self.scheduler.scanner().debounce().len(),
            last_tick: self.scheduler.last_report(),
            rate_limit: self.market.rate_limit(),
            recent_errors: self.recent_errors(),
        }
    }
}

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WatchedSymbol {
    pub symbol: String,
    pub intervals: Vec<Interval>,
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub scanner_state: ScannerState,
    pub scan_period_secs: u64,
    pub profile: ThresholdProfile,
    pub thresholds: ThresholdConfig,
    pub watchlist: Vec<WatchedSymbol>,
    /// Muted symbols, including any not on the watch-list.
    pub muted: Vec<String>,
    pub fallback_symbols: Vec<String>,
    pub debounce_records: usize,
    pub last_tick: Option<TickReport>,
    pub rate_limit: Option<RateLimitSnapshot>,
    pub recent_errors: Vec<ErrorRecord>,
}
