// =============================================================================
// Engine Configuration — process-level settings with atomic save
// =============================================================================
//
// Deployment knobs that are not user-tunable at runtime: scan cadence, fetch
// bounds, where state lives, where the control API listens.  Thresholds,
// watch-list and mutes live in the settings service instead.
//
// All fields carry `#[serde(default)]` so an older or partial file still
// loads.  Environment variables override the file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::binance::DEFAULT_BASE_URL;
use crate::types::ThresholdProfile;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_scan_period_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_candle_limit() -> usize {
    200
}

fn default_max_concurrency() -> usize {
    8
}

fn default_fallback_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_state_dir() -> Option<String> {
    Some("scanner_state".to_string())
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_binance_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Scheduling ---------------------------------------------------------

    /// Seconds between scan ticks.
    #[serde(default = "default_scan_period_secs")]
    pub scan_period_secs: u64,

    /// Per-fetch deadline; a slower fetch counts as a failed unit.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Candles requested per fetch (clamped to the slowest lookback).
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    /// Units evaluated concurrently within a tick.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Start scanning immediately on boot.
    #[serde(default = "default_true")]
    pub autostart: bool,

    // --- Thresholds & symbols -----------------------------------------------

    /// Threshold preset used for defaults and `reset_thresholds`.
    #[serde(default)]
    pub profile: ThresholdProfile,

    /// Symbols scanned while the watch-list is empty.
    #[serde(default = "default_fallback_symbols")]
    pub fallback_symbols: Vec<String>,

    // --- I/O ----------------------------------------------------------------

    /// Directory for persisted state; `None` keeps state in memory only.
    #[serde(default = "default_state_dir")]
    pub state_dir: Option<String>,

    /// Control API listen address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_period_secs: default_scan_period_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            candle_limit: default_candle_limit(),
            max_concurrency: default_max_concurrency(),
            autostart: true,
            profile: ThresholdProfile::default(),
            fallback_symbols: default_fallback_symbols(),
            state_dir: default_state_dir(),
            bind_addr: default_bind_addr(),
            binance_base_url: default_binance_base_url(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            profile = %config.profile,
            scan_period_secs = config.scan_period_secs,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist to `path` using an atomic write (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Apply `SCANNER_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("SCANNER_SYMBOLS") {
            self.fallback_symbols = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("SCANNER_STATE_DIR") {
            let dir = dir.trim();
            self.state_dir = if dir.is_empty() || dir.eq_ignore_ascii_case("memory") {
                None
            } else {
                Some(dir.to_string())
            };
        }
        if let Some(addr) = lookup("SCANNER_BIND_ADDR") {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(raw) = lookup("SCANNER_PROFILE") {
            match raw.parse() {
                Ok(profile) => self.profile = profile,
                Err(e) => warn!(error = %e, "ignoring SCANNER_PROFILE"),
            }
        }
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_secs(self.scan_period_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scan_period_secs, 60);
        assert_eq!(cfg.profile, ThresholdProfile::Strict);
        assert_eq!(cfg.fallback_symbols, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert!(cfg.autostart);
        assert_eq!(cfg.binance_base_url, "https://api.binance.com");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "scan_period_secs": 30, "profile": "classic" }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.scan_period_secs, 30);
        assert_eq!(cfg.profile, ThresholdProfile::Classic);
        assert_eq!(cfg.candle_limit, 200);
        assert_eq!(cfg.state_dir.as_deref(), Some("scanner_state"));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner_config.json");
        let mut cfg = EngineConfig::default();
        cfg.max_concurrency = 3;
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::load(dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SCANNER_SYMBOLS", " adausdt, ,xrpusdt "),
            ("SCANNER_STATE_DIR", "memory"),
            ("SCANNER_BIND_ADDR", "127.0.0.1:9000"),
            ("SCANNER_PROFILE", "bogus"),
        ]
        .into_iter()
        .collect();
        let mut cfg = EngineConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.fallback_symbols, vec!["ADAUSDT", "XRPUSDT"]);
        assert_eq!(cfg.state_dir, None);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        // Unparseable profile keeps the previous value.
        assert_eq!(cfg.profile, ThresholdProfile::Strict);
    }
}
