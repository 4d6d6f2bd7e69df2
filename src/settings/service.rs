// =============================================================================
// Settings Service — single validated entry point for every config mutation
// =============================================================================
//
// Readers (the scan tick, the API) take a cloned `ScannerSettings` snapshot.
// Writers are serialised by `write_guard`; each mutation is applied to a copy,
// validated, persisted, and only then swapped in.  A rejected or unpersisted
// mutation leaves the live settings untouched.
// =============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use super::thresholds::{ThresholdConfig, ThresholdKey};
use super::watchlist::{normalize_symbol, MuteSet, WatchList};
use crate::error::{SettingsError, ValidationError};
use crate::persistence::{load_or, save_as, KeyValueStore, KEY_MUTED, KEY_THRESHOLDS, KEY_WATCHLIST};
use crate::types::{Interval, ThresholdProfile};

/// Consistent view of everything a tick reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScannerSettings {
    pub thresholds: ThresholdConfig,
    pub watchlist: WatchList,
    pub muted: MuteSet,
}

pub struct SettingsService {
    profile: ThresholdProfile,
    state: RwLock<ScannerSettings>,
    write_guard: Mutex<()>,
    store: Arc<dyn KeyValueStore>,
}

impl SettingsService {
    /// Reload persisted settings, falling back to the profile defaults for
    /// anything missing or invalid.
    pub fn load(store: Arc<dyn KeyValueStore>, profile: ThresholdProfile) -> Self {
        let defaults = ThresholdConfig::for_profile(profile);
        let mut thresholds: ThresholdConfig = load_or(&*store, KEY_THRESHOLDS, defaults.clone());
        if let Err(e) = thresholds.validate() {
            warn!(error = %e, "stored thresholds are invalid, restoring profile defaults");
            thresholds = defaults;
        }

        let stored: WatchList = load_or(&*store, KEY_WATCHLIST, WatchList::default());
        let watchlist = sanitize_watchlist(stored);
        let stored_muted: Vec<String> = load_or(&*store, KEY_MUTED, Vec::new());
        let muted = sanitize_muted(stored_muted);

        info!(
            profile = %profile,
            symbols = ?watchlist.symbols(),
            muted = muted.len(),
            rsi_buy = thresholds.rsi_buy,
            rsi_sell = thresholds.rsi_sell,
            "settings loaded"
        );

        Self {
            profile,
            state: RwLock::new(ScannerSettings {
                thresholds,
                watchlist,
                muted,
            }),
            write_guard: Mutex::new(()),
            store,
        }
    }

    pub fn profile(&self) -> ThresholdProfile {
        self.profile
    }

    /// Copy-on-read snapshot.
    pub fn snapshot(&self) -> ScannerSettings {
        self.state.read().clone()
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.state.read().thresholds.clone()
    }

    // ── Thresholds ──────────────────────────────────────────────────────

    pub fn update_threshold(&self, key: &str, value: f64) -> Result<ThresholdConfig, SettingsError> {
        let key: ThresholdKey = key.parse()?;
        let updated = self.mutate(KEY_THRESHOLDS, |s| {
            s.thresholds = s.thresholds.with_update(key, value)?;
            Ok(s.thresholds.clone())
        })?;
        info!(key = %key, value, "threshold updated");
        Ok(updated)
    }

    pub fn reset_thresholds(&self) -> Result<ThresholdConfig, SettingsError> {
        let profile = self.profile;
        let reset = self.mutate(KEY_THRESHOLDS, |s| {
            s.thresholds = ThresholdConfig::for_profile(profile);
            Ok(s.thresholds.clone())
        })?;
        info!(profile = %profile, "thresholds reset to defaults");
        Ok(reset)
    }

    // ── Watch-list ──────────────────────────────────────────────────────

    pub fn add_symbol(&self, raw: &str) -> Result<String, SettingsError> {
        let symbol = self.mutate(KEY_WATCHLIST, |s| s.watchlist.add(raw))?;
        info!(symbol = %symbol, "symbol added to watch-list");
        Ok(symbol)
    }

    /// Remove a symbol.  An absent symbol is reported as
    /// [`ValidationError::UnknownSymbol`] and the list is left as it was.
    pub fn remove_symbol(&self, raw: &str) -> Result<String, SettingsError> {
        let symbol = normalize_symbol(raw)?;
        self.mutate(KEY_WATCHLIST, |s| {
            if s.watchlist.remove(&symbol) {
                Ok(())
            } else {
                Err(ValidationError::UnknownSymbol(symbol.clone()))
            }
        })?;
        info!(symbol = %symbol, "symbol removed from watch-list");
        Ok(symbol)
    }

    pub fn set_symbol_intervals(
        &self,
        raw: &str,
        intervals: &[Interval],
    ) -> Result<Vec<Interval>, SettingsError> {
        let symbol = normalize_symbol(raw)?;
        let applied = self.mutate(KEY_WATCHLIST, |s| {
            s.watchlist.set_intervals(&symbol, intervals)?;
            Ok(s.watchlist.intervals_for(&symbol))
        })?;
        info!(symbol = %symbol, intervals = ?applied, "symbol intervals updated");
        Ok(applied)
    }

    // ── Mute-set ────────────────────────────────────────────────────────

    pub fn mute_symbol(&self, raw: &str) -> Result<bool, SettingsError> {
        let changed = self.mutate(KEY_MUTED, |s| s.muted.mute(raw))?;
        info!(symbol = %raw.trim().to_uppercase(), changed, "symbol muted");
        Ok(changed)
    }

    pub fn unmute_symbol(&self, raw: &str) -> Result<bool, SettingsError> {
        let changed = self.mutate(KEY_MUTED, |s| s.muted.unmute(raw))?;
        info!(symbol = %raw.trim().to_uppercase(), changed, "symbol unmuted");
        Ok(changed)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn mutate<T>(
        &self,
        key: &'static str,
        apply: impl FnOnce(&mut ScannerSettings) -> Result<T, ValidationError>,
    ) -> Result<T, SettingsError> {
        let _guard = self.write_guard.lock();
        let mut next = self.state.read().clone();
        let out = apply(&mut next)?;
        self.persist(key, &next)?;
        *self.state.write() = next;
        Ok(out)
    }

    fn persist(&self, key: &'static str, settings: &ScannerSettings) -> Result<(), SettingsError> {
        let store = &*self.store;
        let result = match key {
            KEY_THRESHOLDS => save_as(store, key, &settings.thresholds),
            KEY_WATCHLIST => save_as(store, key, &settings.watchlist),
            KEY_MUTED => save_as(store, key, &settings.muted),
            _ => Ok(()),
        };
        result.map_err(|source| SettingsError::Persistence { key, source })
    }
}

/// Normalise stored mute entries, dropping any that no longer validate.
fn sanitize_muted(stored: Vec<String>) -> MuteSet {
    let mut clean = MuteSet::default();
    for symbol in stored {
        if let Err(e) = clean.mute(&symbol) {
            warn!(symbol = %symbol, error = %e, "dropping stored mute entry");
        }
    }
    clean
}

/// Drop stored symbols that no longer pass validation.
fn sanitize_watchlist(stored: WatchList) -> WatchList {
    let mut clean = WatchList::default();
    for symbol in stored.symbols() {
        match clean.add(symbol) {
            Ok(s) => {
                if let Some(ivs) = stored.interval_overrides().get(symbol) {
                    if let Err(e) = clean.set_intervals(&s, ivs) {
                        warn!(symbol = %s, error = %e, "dropping stored interval override");
                    }
                }
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "dropping stored symbol"),
        }
    }
    clean
}
