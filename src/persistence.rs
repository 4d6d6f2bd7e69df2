// =============================================================================
// Key-Value Persistence — load/save boundary for durable scanner state
// =============================================================================
//
// The scanner only needs a minimal key -> JSON value shape.  The file-backed
// store writes one `<key>.json` per key using an atomic tmp + rename so a
// crash mid-write never leaves a truncated file behind.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const KEY_WATCHLIST: &str = "watchlist";
pub const KEY_MUTED: &str = "muted";
pub const KEY_THRESHOLDS: &str = "thresholds";
pub const KEY_LAST_SIGNALS: &str = "last_signals";

/// Durable key -> JSON value store.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved under `key` yet.
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()>;
}

/// Load and deserialise `key`, falling back to `default` when the key is
/// missing or unreadable.  Unreadable state is logged, never fatal.
pub fn load_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match store.load(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "stored value has unexpected shape, using default");
                default
            }
        },
        Ok(None) => {
            debug!(key, "no stored value, using default");
            default
        }
        Err(e) => {
            warn!(key, error = %e, "failed to load stored value, using default");
            default
        }
    }
}

/// Serialise `value` and save it under `key`.
pub fn save_as<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)
        .with_context(|| format!("failed to serialise '{key}'"))?;
    store.save(key, &json)
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the state directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create state dir {}", dir.display()))?;
        info!(dir = %dir.display(), "state store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialise '{key}'"))?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename tmp state to {}", path.display()))?;

        debug!(key, path = %path.display(), "state saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Volatile store for runs that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_store_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("state")).unwrap();

        assert!(store.load(KEY_MUTED).unwrap().is_none());
        store.save(KEY_MUTED, &json!(["BTCUSDT"])).unwrap();
        assert_eq!(store.load(KEY_MUTED).unwrap(), Some(json!(["BTCUSDT"])));

        // No tmp file left behind.
        assert!(!dir.path().join("state/muted.json.tmp").exists());
    }

    #[test]
    fn file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("thresholds.json"), "{ not json").unwrap();
        assert!(store.load(KEY_THRESHOLDS).is_err());

        // load_or degrades to the default instead.
        let v: Vec<String> = load_or(&store, KEY_THRESHOLDS, vec!["x".to_string()]);
        assert_eq!(v, vec!["x".to_string()]);
    }

    #[test]
    fn typed_helpers_roundtrip() {
        let store = MemoryStore::new();
        save_as(&store, KEY_WATCHLIST, &vec!["ETHUSDT"]).unwrap();
        let v: Vec<String> = load_or(&store, KEY_WATCHLIST, Vec::new());
        assert_eq!(v, vec!["ETHUSDT".to_string()]);
    }

    #[test]
    fn load_or_wrong_shape_uses_default() {
        let store = MemoryStore::new();
        store.save(KEY_MUTED, &json!({"unexpected": true})).unwrap();
        let v: Vec<String> = load_or(&store, KEY_MUTED, Vec::new());
        assert!(v.is_empty());
    }
}
