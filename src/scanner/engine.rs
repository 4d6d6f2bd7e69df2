// =============================================================================
// Scan Engine — one tick over every (symbol, interval) unit
// =============================================================================
//
// A tick works on a single settings snapshot taken at its start, so a
// threshold or watch-list change lands on the next tick, never mid-tick.
//
// Units are fetched and classified concurrently (bounded).  Gating then runs
// sequentially in key order:
//
//   failed / insufficient / NEUTRAL  -> nothing emitted
//   muted symbol                     -> suppressed, debounce untouched
//   inside validity window           -> suppressed
//   otherwise                        -> record firing, emit alert
//
// One unit failing never affects another.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DataUnavailable, ScanError};
use crate::indicators::IndicatorSnapshot;
use crate::market_data::{clamp_limit, MarketDataSource, SeriesKey};
use crate::notifier::AlertSender;
use crate::persistence::KeyValueStore;
use crate::runtime_config::EngineConfig;
use crate::settings::{SettingsService, ThresholdConfig};
use crate::signals::{classify, Alert, AlertDebounceStore, Classification};
use crate::types::Signal;

/// Per-tick knobs taken from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub candle_limit: usize,
    pub max_concurrency: usize,
    pub fetch_timeout: Duration,
    pub fallback_symbols: Vec<String>,
}

impl From<&EngineConfig> for ScanOptions {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            candle_limit: cfg.candle_limit,
            max_concurrency: cfg.max_concurrency.max(1),
            fetch_timeout: cfg.fetch_timeout(),
            fallback_symbols: cfg.fallback_symbols.clone(),
        }
    }
}

/// A unit that produced no verdict this tick.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub at: Option<DateTime<Utc>>,
    pub units: usize,
    pub evaluated: usize,
    pub buy: usize,
    pub sell: usize,
    pub neutral: usize,
    pub insufficient: usize,
    pub muted_suppressed: usize,
    pub debounced: usize,
    pub alerts_emitted: usize,
    pub failures: Vec<UnitFailure>,
    pub duration_ms: u64,
}

pub struct Scanner {
    settings: Arc<SettingsService>,
    debounce: Arc<AlertDebounceStore>,
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn KeyValueStore>,
    alerts: AlertSender,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(
        settings: Arc<SettingsService>,
        debounce: Arc<AlertDebounceStore>,
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn KeyValueStore>,
        alerts: AlertSender,
        options: ScanOptions,
    ) -> Self {
        Self {
            settings,
            debounce,
            source,
            store,
            alerts,
            options,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings
    }

    pub fn debounce(&self) -> &Arc<AlertDebounceStore> {
        &self.debounce
    }

    /// Fetch and classify one unit.  No gating, no side effects.
    pub async fn evaluate(
        &self,
        key: &SeriesKey,
        thresholds: &ThresholdConfig,
    ) -> Result<Classification, ScanError> {
        let limit = clamp_limit(self.options.candle_limit, thresholds.min_history());
        let fetch = self.source.fetch(&key.symbol, key.interval, limit);

        let series = tokio::time::timeout(self.options.fetch_timeout, fetch)
            .await
            .map_err(|_| ScanError::Timeout {
                symbol: key.symbol.clone(),
                interval: key.interval,
                secs: self.options.fetch_timeout.as_secs(),
            })??;

        let snapshot = IndicatorSnapshot::from_series(&series, thresholds).ok_or_else(|| {
            DataUnavailable::new(key.symbol.clone(), key.interval, "empty candle series")
        })?;

        if let Some(short) = snapshot.insufficient_history(&series) {
            debug!(unit = %key, error = %short, "indicators absent");
        }

        Ok(classify(&snapshot, thresholds))
    }

    /// Run one full scan at logical time `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let started = Instant::now();
        let settings = self.settings.snapshot();
        let thresholds = &settings.thresholds;
        let units = settings.watchlist.units(&self.options.fallback_symbols);

        let mut report = TickReport {
            at: Some(now),
            units: units.len(),
            ..TickReport::default()
        };

        let mut outcomes: Vec<(SeriesKey, Result<Classification, ScanError>)> =
            stream::iter(units)
                .map(|key| async move {
                    let outcome = self.evaluate(&key, thresholds).await;
                    (key, outcome)
                })
                .buffer_unordered(self.options.max_concurrency)
                .collect()
                .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let window = thresholds.validity_window();
        for (key, outcome) in outcomes {
            let classification = match outcome {
                Ok(c) => c,
                Err(e) => {
                    warn!(unit = %key, error = %e, "unit skipped this tick");
                    report.failures.push(UnitFailure {
                        unit: key.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            report.evaluated += 1;

            match classification.signal {
                Signal::Buy => report.buy += 1,
                Signal::Sell => report.sell += 1,
                Signal::Neutral => {
                    report.neutral += 1;
                    if classification.is_insufficient() {
                        report.insufficient += 1;
                    }
                    continue;
                }
            }

            if settings.muted.is_muted(&key.symbol) {
                debug!(unit = %key, signal = %classification.signal, "muted, alert suppressed");
                report.muted_suppressed += 1;
                continue;
            }

            if !self.debounce.should_fire(&key, now, window) {
                debug!(unit = %key, signal = %classification.signal, "within validity window, alert suppressed");
                report.debounced += 1;
                continue;
            }

            self.debounce.record_fired(&key, now);
            let alert = Alert::new(
                &key,
                &classification,
                thresholds.ema_period,
                thresholds.signal_validity_minutes,
                now,
            );
            info!(
                unit = %key,
                signal = %alert.signal,
                price = alert.price,
                rsi = ?alert.rsi,
                "signal emitted"
            );
            if self.alerts.send(alert).is_err() {
                warn!(unit = %key, "alert dispatcher is gone, alert dropped");
            }
            report.alerts_emitted += 1;
        }

        if report.alerts_emitted > 0 {
            if let Err(e) = self.debounce.save(&*self.store) {
                warn!(error = %e, "failed to persist debounce records");
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            units = report.units,
            evaluated = report.evaluated,
            alerts = report.alerts_emitted,
            muted = report.muted_suppressed,
            debounced = report.debounced,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "scan tick complete"
        );
        report
    }
}
