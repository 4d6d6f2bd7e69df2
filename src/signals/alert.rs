// =============================================================================
// Alert — auditable record of an emitted signal
// =============================================================================
//
// Every alert that passes the mute and debounce gates becomes an `Alert`.
// The dispatcher turns it into notifier text; the API keeps the most recent
// ones for inspection.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::market_data::SeriesKey;
use crate::signals::classifier::Classification;
use crate::types::{Interval, Signal};

/// An emitted BUY / SELL alert.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub symbol: String,
    pub interval: Interval,
    pub signal: Signal,

    pub price: f64,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub ema: Option<f64>,
    pub ema_period: usize,
    pub last_volume: f64,
    pub avg_volume: f64,

    /// Debounce window in force when the alert fired.
    pub validity_minutes: f64,

    /// Timestamp of the tick that produced the alert.
    pub fired_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        key: &SeriesKey,
        classification: &Classification,
        ema_period: usize,
        validity_minutes: f64,
        fired_at: DateTime<Utc>,
    ) -> Self {
        let snap = &classification.rationale.snapshot;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: key.symbol.clone(),
            interval: key.interval,
            signal: classification.signal,
            price: snap.last_close,
            rsi: snap.rsi,
            macd_line: snap.macd_line,
            macd_signal: snap.macd_signal,
            ema: snap.ema_last,
            ema_period,
            last_volume: snap.last_volume,
            avg_volume: snap.avg_volume,
            validity_minutes,
            fired_at,
        }
    }

    /// Plain-text notifier message.
    pub fn message(&self) -> String {
        let verdict = match self.signal {
            Signal::Buy => "STRONG BUY",
            Signal::Sell => "STRONG SELL",
            Signal::Neutral => "NEUTRAL",
        };
        format!(
            "{verdict} {symbol} ({interval})\n\
             Price: {price}\n\
             RSI: {rsi}\n\
             MACD: {macd} vs Signal {signal}\n\
             EMA{ema_period}: {ema}\n\
             Volume: {vol:.4} (avg {avg:.4})\n\
             Valid: {validity}min",
            symbol = self.symbol,
            interval = self.interval,
            price = self.price,
            rsi = fmt_opt(self.rsi, 2),
            macd = fmt_opt(self.macd_line, 6),
            signal = fmt_opt(self.macd_signal, 6),
            ema_period = self.ema_period,
            ema = fmt_opt(self.ema, 6),
            vol = self.last_volume,
            avg = self.avg_volume,
            validity = self.validity_minutes,
        )
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}
