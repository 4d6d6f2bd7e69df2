// =============================================================================
// Notifier — outbound alert delivery
// =============================================================================
//
// The scanner never awaits delivery.  Alerts that pass the gates are pushed
// onto an unbounded channel; the dispatcher task drains it, calls the
// configured notifier and records the outcome in a bounded log.  A failed
// delivery is logged and recorded, nothing more: the debounce record was
// already written when the alert was emitted.
// =============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::NotifierFailure;
use crate::signals::Alert;

/// Number of delivered/failed alerts kept for inspection.
const MAX_RECENT_ALERTS: usize = 100;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs and failure records.
    fn name(&self) -> &'static str;

    async fn notify(&self, text: &str) -> Result<(), NotifierFailure>;
}

// =============================================================================
// LogNotifier
// =============================================================================

/// Writes alerts to the log.  Used when no chat transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, text: &str) -> Result<(), NotifierFailure> {
        info!(alert = %text, "alert");
        Ok(())
    }
}

// =============================================================================
// TelegramNotifier
// =============================================================================

/// Sends alerts through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API.to_string(),
            client,
        })
    }

    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` read through
    /// `lookup`.  `Ok(None)` when either is unset or blank.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Option<Self>> {
        let token = lookup("TELEGRAM_BOT_TOKEN").filter(|s| !s.trim().is_empty());
        let chat = lookup("TELEGRAM_CHAT_ID").filter(|s| !s.trim().is_empty());
        match (token, chat) {
            (Some(token), Some(chat)) => Ok(Some(Self::new(token.trim(), chat.trim())?)),
            _ => Ok(None),
        }
    }

    fn failure(&self, reason: impl Into<String>) -> NotifierFailure {
        NotifierFailure {
            notifier: self.name(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    #[instrument(skip(self, text), name = "telegram::send_message")]
    async fn notify(&self, text: &str) -> Result<(), NotifierFailure> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| self.failure(format!("request failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(self.failure(format!("sendMessage returned {status}: {detail}")));
        }
        debug!("telegram message sent");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

// =============================================================================
// Alert log & dispatcher
// =============================================================================

/// An alert together with its delivery outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    #[serde(flatten)]
    pub alert: Alert,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Bounded, newest-last log of dispatched alerts.
#[derive(Debug, Default)]
pub struct AlertLog {
    records: RwLock<VecDeque<AlertRecord>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: AlertRecord) {
        let mut records = self.records.write();
        records.push_back(record);
        while records.len() > MAX_RECENT_ALERTS {
            records.pop_front();
        }
    }

    pub fn recent(&self) -> Vec<AlertRecord> {
        self.records.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }
}

/// Sending half handed to the scanner.
pub type AlertSender = mpsc::UnboundedSender<Alert>;

/// Drains the alert channel and delivers each alert.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    log: Arc<AlertLog>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, log: Arc<AlertLog>) -> Self {
        Self { notifier, log }
    }

    /// Create the channel and the dispatcher that will drain it.
    pub fn channel(
        notifier: Arc<dyn Notifier>,
        log: Arc<AlertLog>,
    ) -> (AlertSender, mpsc::UnboundedReceiver<Alert>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, rx, Self::new(notifier, log))
    }

    /// Run until every sender has been dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Alert>) {
        info!(notifier = self.notifier.name(), "alert dispatcher started");
        while let Some(alert) = rx.recv().await {
            self.deliver(alert).await;
        }
        info!("alert channel closed, dispatcher exiting");
    }

    async fn deliver(&self, alert: Alert) {
        let text = alert.message();
        let outcome = self.notifier.notify(&text).await;

        let error = match outcome {
            Ok(()) => {
                debug!(
                    symbol = %alert.symbol,
                    interval = %alert.interval,
                    signal = %alert.signal,
                    "alert delivered"
                );
                None
            }
            Err(e) => {
                warn!(
                    symbol = %alert.symbol,
                    interval = %alert.interval,
                    error = %e,
                    "alert delivery failed"
                );
                Some(e.to_string())
            }
        };

        self.log.push(AlertRecord {
            delivered: error.is_none(),
            error,
            alert,
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::market_data::SeriesKey;
    use crate::settings::ThresholdConfig;
    use crate::signals::classify;
    use crate::types::{Interval, Signal, ThresholdProfile};
    use chrono::Utc;
    use std::collections::HashMap;

    struct RecordingNotifier {
        sent: parking_lot::Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, text: &str) -> Result<(), NotifierFailure> {
            self.sent.lock().push(text.to_string());
            if self.fail {
                return Err(NotifierFailure {
                    notifier: "recording",
                    reason: "chat unreachable".into(),
                });
            }
            Ok(())
        }
    }

    fn sample_alert(symbol: &str) -> Alert {
        let snap = IndicatorSnapshot {
            rsi: Some(15.0),
            ema_last: Some(99.0),
            macd_line: Some(0.5),
            macd_signal: Some(0.2),
            last_close: 100.0,
            last_volume: 150.0,
            avg_volume: 100.0,
            candles: 200,
        };
        let t = ThresholdConfig::for_profile(ThresholdProfile::Strict);
        let c = classify(&snap, &t);
        assert_eq!(c.signal, Signal::Buy);
        Alert::new(
            &SeriesKey::new(symbol, Interval::M15),
            &c,
            t.ema_period,
            t.signal_validity_minutes,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn dispatcher_delivers_and_records() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Default::default(),
            fail: false,
        });
        let log = Arc::new(AlertLog::new());
        let (tx, rx, dispatcher) = AlertDispatcher::channel(notifier.clone(), log.clone());

        tx.send(sample_alert("BTCUSDT")).unwrap();
        tx.send(sample_alert("ETHUSDT")).unwrap();
        drop(tx);
        dispatcher.run(rx).await;

        assert_eq!(notifier.sent.lock().len(), 2);
        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|r| r.delivered));
        assert_eq!(recent[1].alert.symbol, "ETHUSDT");
    }

    #[tokio::test]
    async fn failed_delivery_is_recorded_not_fatal() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Default::default(),
            fail: true,
        });
        let log = Arc::new(AlertLog::new());
        let (tx, rx, dispatcher) = AlertDispatcher::channel(notifier, log.clone());

        tx.send(sample_alert("BTCUSDT")).unwrap();
        tx.send(sample_alert("SOLUSDT")).unwrap();
        drop(tx);
        dispatcher.run(rx).await;

        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert!(!recent[0].delivered);
        assert!(recent[0].error.as_deref().unwrap().contains("chat unreachable"));
    }

    #[test]
    fn alert_log_is_bounded() {
        let log = AlertLog::new();
        for i in 0..(MAX_RECENT_ALERTS + 5) {
            log.push(AlertRecord {
                alert: sample_alert(&format!("SYM{i}")),
                delivered: true,
                error: None,
            });
        }
        assert_eq!(log.len(), MAX_RECENT_ALERTS);
        assert_eq!(log.recent()[0].alert.symbol, "SYM5");
    }

    #[test]
    fn telegram_from_env_requires_both_values() {
        let only_token: HashMap<&str, &str> = [("TELEGRAM_BOT_TOKEN", "123:abc")].into();
        let none = TelegramNotifier::from_env(|k| only_token.get(k).map(|v| v.to_string()));
        assert!(none.unwrap().is_none());

        let both: HashMap<&str, &str> =
            [("TELEGRAM_BOT_TOKEN", "123:abc"), ("TELEGRAM_CHAT_ID", "42")].into();
        let notifier = TelegramNotifier::from_env(|k| both.get(k).map(|v| v.to_string()))
            .unwrap()
            .unwrap();
        assert!(!format!("{notifier:?}").contains("123:abc"));
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        assert!(LogNotifier.notify("hello").await.is_ok());
    }
}
