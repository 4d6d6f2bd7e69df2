// =============================================================================
// Watch-list & Mute-set
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::market_data::SeriesKey;
use crate::types::Interval;

/// Trim `raw`, require a non-empty ASCII alphanumeric string, then upper-case
/// it.
pub fn normalize_symbol(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidSymbol(raw.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

// =============================================================================
// WatchList
// =============================================================================

/// Symbols to scan, in insertion order, each optionally restricted to a subset
/// of intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchList {
    symbols: Vec<String>,
    intervals: BTreeMap<String, Vec<Interval>>,
}

impl WatchList {
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for s in symbols {
            list.add(s.as_ref())?;
        }
        Ok(list)
    }

    /// Add a symbol.  Duplicates are rejected.
    pub fn add(&mut self, raw: &str) -> Result<String, ValidationError> {
        let symbol = normalize_symbol(raw)?;
        if self.contains(&symbol) {
            return Err(ValidationError::DuplicateSymbol(symbol));
        }
        self.symbols.push(symbol.clone());
        Ok(symbol)
    }

    /// Remove a symbol and its interval mapping.  Returns `false` without
    /// touching the list when the symbol is absent.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s != symbol);
        self.intervals.remove(symbol);
        self.symbols.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Restrict `symbol` to `intervals` (deduplicated, sorted).
    pub fn set_intervals(
        &mut self,
        symbol: &str,
        intervals: &[Interval],
    ) -> Result<(), ValidationError> {
        if !self.contains(symbol) {
            return Err(ValidationError::UnknownSymbol(symbol.to_string()));
        }
        let set: BTreeSet<Interval> = intervals.iter().copied().collect();
        if set.is_empty() {
            return Err(ValidationError::EmptyIntervals(symbol.to_string()));
        }
        self.intervals
            .insert(symbol.to_string(), set.into_iter().collect());
        Ok(())
    }

    /// Intervals scanned for `symbol`; the full standard set when unmapped.
    pub fn intervals_for(&self, symbol: &str) -> Vec<Interval> {
        self.intervals
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Interval::ALL.to_vec())
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn interval_overrides(&self) -> &BTreeMap<String, Vec<Interval>> {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Every (symbol, interval) unit of work for one tick.  An empty list
    /// falls back to `fallback` scanned on all intervals.
    pub fn units(&self, fallback: &[String]) -> Vec<SeriesKey> {
        if self.symbols.is_empty() {
            return fallback
                .iter()
                .flat_map(|s| Interval::ALL.iter().map(move |iv| SeriesKey::new(s.clone(), *iv)))
                .collect();
        }
        self.symbols
            .iter()
            .flat_map(|s| {
                self.intervals_for(s)
                    .into_iter()
                    .map(move |iv| SeriesKey::new(s.clone(), iv))
            })
            .collect()
    }
}

// =============================================================================
// MuteSet
// =============================================================================

/// Symbols whose alerts are suppressed.  Muted symbols are still scanned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MuteSet {
    symbols: BTreeSet<String>,
}

impl MuteSet {
    /// Mute a symbol.  Returns `false` when it was already muted.
    pub fn mute(&mut self, raw: &str) -> Result<bool, ValidationError> {
        let symbol = normalize_symbol(raw)?;
        Ok(self.symbols.insert(symbol))
    }

    /// Unmute a symbol.  Returns `false` when it was not muted.
    pub fn unmute(&mut self, raw: &str) -> Result<bool, ValidationError> {
        let symbol = normalize_symbol(raw)?;
        Ok(self.symbols.remove(&symbol))
    }

    pub fn is_muted(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_rejects_garbage() {
        assert_eq!(normalize_symbol(" btcusdt ").unwrap(), "BTCUSDT");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("BTC-USDT").is_err());
        assert!(normalize_symbol("BTC/USDT").is_err());
    }

    #[test]
    fn normalize_rejects_non_ascii_that_uppercases_to_ascii() {
        // 'ß' upper-cases to "SS" and 'ﬁ' to "FI".
        assert_eq!(
            normalize_symbol("ß").unwrap_err(),
            ValidationError::InvalidSymbol("ß".into())
        );
        assert!(normalize_symbol("ﬁlusdt").is_err());
        assert!(normalize_symbol("BTCUSDTß").is_err());
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut list = WatchList::default();
        assert_eq!(list.add("ethusdt").unwrap(), "ETHUSDT");
        assert_eq!(
            list.add("ETHUSDT").unwrap_err(),
            ValidationError::DuplicateSymbol("ETHUSDT".into())
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut list = WatchList::from_symbols(["BTCUSDT"]).unwrap();
        let before = list.clone();
        assert!(!list.remove("SOLUSDT"));
        assert_eq!(list, before);
        assert!(list.remove("BTCUSDT"));
        assert!(list.is_empty());
    }

    #[test]
    fn intervals_default_to_full_set() {
        let mut list = WatchList::from_symbols(["BTCUSDT", "ETHUSDT"]).unwrap();
        list.set_intervals("ETHUSDT", &[Interval::H1, Interval::M15, Interval::H1])
            .unwrap();
        assert_eq!(list.intervals_for("BTCUSDT"), Interval::ALL.to_vec());
        assert_eq!(list.intervals_for("ETHUSDT"), vec![Interval::M15, Interval::H1]);

        let units = list.units(&[]);
        assert_eq!(units.len(), 6 + 2);
        assert_eq!(units[0], SeriesKey::new("BTCUSDT", Interval::M1));
        assert_eq!(units[7], SeriesKey::new("ETHUSDT", Interval::H1));
    }

    #[test]
    fn set_intervals_validates() {
        let mut list = WatchList::from_symbols(["BTCUSDT"]).unwrap();
        assert!(matches!(
            list.set_intervals("XRPUSDT", &[Interval::M1]),
            Err(ValidationError::UnknownSymbol(_))
        ));
        assert!(matches!(
            list.set_intervals("BTCUSDT", &[]),
            Err(ValidationError::EmptyIntervals(_))
        ));
    }

    #[test]
    fn remove_drops_interval_mapping() {
        let mut list = WatchList::from_symbols(["BTCUSDT"]).unwrap();
        list.set_intervals("BTCUSDT", &[Interval::D1]).unwrap();
        list.remove("BTCUSDT");
        list.add("BTCUSDT").unwrap();
        assert_eq!(list.intervals_for("BTCUSDT"), Interval::ALL.to_vec());
    }

    #[test]
    fn empty_list_uses_fallback() {
        let list = WatchList::default();
        let units = list.units(&["SOLUSDT".to_string()]);
        assert_eq!(units.len(), 6);
        assert!(units.iter().all(|k| k.symbol == "SOLUSDT"));
    }

    #[test]
    fn mute_set_roundtrip() {
        let mut muted = MuteSet::default();
        assert!(muted.mute("btcusdt").unwrap());
        assert!(!muted.mute("BTCUSDT").unwrap());
        assert!(muted.is_muted("BTCUSDT"));
        assert!(muted.unmute("BTCUSDT").unwrap());
        assert!(!muted.unmute("BTCUSDT").unwrap());
        assert!(muted.mute("not a symbol").is_err());
    }

    #[test]
    fn serde_shapes() {
        let mut muted = MuteSet::default();
        muted.mute("ETHUSDT").unwrap();
        assert_eq!(serde_json::to_string(&muted).unwrap(), r#"["ETHUSDT"]"#);

        let list: WatchList = serde_json::from_str(r#"{ "symbols": ["BTCUSDT"] }"#).unwrap();
        assert!(list.contains("BTCUSDT"));
    }
}
