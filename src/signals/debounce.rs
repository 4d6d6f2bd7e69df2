// =============================================================================
// Alert Debounce Store — last-fired timestamp per (symbol, interval)
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::market_data::SeriesKey;
use crate::persistence::{load_or, save_as, KeyValueStore, KEY_LAST_SIGNALS};
use crate::types::Interval;

/// Persisted form of one debounce record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceEntry {
    pub symbol: String,
    pub interval: Interval,
    pub last_fired: DateTime<Utc>,
}

/// Tracks when each (symbol, interval) last emitted an alert.
///
/// Records are created on the first firing and overwritten on each re-fire;
/// they are never deleted.  Writes to different keys are independent; two
/// writes to the same key resolve last-write-wins.
#[derive(Debug, Default)]
pub struct AlertDebounceStore {
    last_fired: RwLock<HashMap<SeriesKey, DateTime<Utc>>>,
}

impl AlertDebounceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DebounceEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|e| (SeriesKey::new(e.symbol, e.interval), e.last_fired))
            .collect();
        Self {
            last_fired: RwLock::new(map),
        }
    }

    /// Restore the records saved under [`KEY_LAST_SIGNALS`].
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let entries: Vec<DebounceEntry> = load_or(store, KEY_LAST_SIGNALS, Vec::new());
        Self::from_entries(entries)
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        save_as(store, KEY_LAST_SIGNALS, &self.entries())
    }

    /// `true` when no record exists or `now - last_fired > window`.
    pub fn should_fire(&self, key: &SeriesKey, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_fired.read().get(key) {
            Some(&last) => now - last > window,
            None => true,
        }
    }

    pub fn record_fired(&self, key: &SeriesKey, now: DateTime<Utc>) {
        self.last_fired.write().insert(key.clone(), now);
    }

    pub fn last_fired(&self, key: &SeriesKey) -> Option<DateTime<Utc>> {
        self.last_fired.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_fired.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.read().is_empty()
    }

    /// All records, sorted by key, in persisted form.
    pub fn entries(&self) -> Vec<DebounceEntry> {
        let mut entries: Vec<DebounceEntry> = self
            .last_fired
            .read()
            .iter()
            .map(|(k, &t)| DebounceEntry {
                symbol: k.symbol.clone(),
                interval: k.interval,
                last_fired: t,
            })
            .collect();
        entries.sort_by(|a, b| (&a.symbol, a.interval).cmp(&(&b.symbol, b.interval)));
        entries
    }
}
