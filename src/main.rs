// =============================================================================
// Signal Scanner — Main Entry Point
// =============================================================================
//
// Scans a watch-list of Binance spot symbols on several candle intervals,
// classifies each (symbol, interval) as BUY / SELL / NEUTRAL from RSI, MACD,
// EMA and volume, and pushes debounced alerts to a notifier.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod error;
mod indicators;
mod market_data;
mod notifier;
mod persistence;
mod runtime_config;
mod scanner;
mod settings;
mod signals;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::notifier::{AlertDispatcher, AlertLog, LogNotifier, Notifier, TelegramNotifier};
use crate::persistence::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::runtime_config::EngineConfig;
use crate::scanner::{ScanOptions, ScanScheduler, Scanner};
use crate::settings::SettingsService;
use crate::signals::AlertDebounceStore;

const CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Signal Scanner starting up");

    let mut config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });
    if !std::path::Path::new(CONFIG_PATH).exists() {
        // Leave a template next to the binary for operators to edit.
        if let Err(e) = config.save(CONFIG_PATH) {
            warn!(error = %e, "Failed to write default config");
        }
    }
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        profile = %config.profile,
        scan_period_secs = config.scan_period_secs,
        fallback_symbols = ?config.fallback_symbols,
        "Engine configured"
    );

    // ── 2. Persistence & settings ────────────────────────────────────────
    let store: Arc<dyn KeyValueStore> = match &config.state_dir {
        Some(dir) => Arc::new(JsonFileStore::open(dir)?),
        None => {
            warn!("No state dir configured, settings will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let settings = Arc::new(SettingsService::load(store.clone(), config.profile));
    let debounce = Arc::new(AlertDebounceStore::load(&*store));
    info!(records = debounce.len(), "Debounce records restored");

    // ── 3. Market data client ────────────────────────────────────────────
    let client = Arc::new(
        BinanceClient::new(&config.binance_base_url, config.fetch_timeout())
            .context("failed to build Binance client")?,
    );

    // ── 4. Notifier & dispatcher ─────────────────────────────────────────
    let notifier: Arc<dyn Notifier> =
        match TelegramNotifier::from_env(|key| std::env::var(key).ok())? {
            Some(telegram) => {
                info!("Alerts will be sent to Telegram");
                Arc::new(telegram)
            }
            None => {
                warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, alerts go to the log");
                Arc::new(LogNotifier)
            }
        };

    let alert_log = Arc::new(AlertLog::new());
    let (alert_tx, alert_rx, dispatcher) = AlertDispatcher::channel(notifier, alert_log.clone());
    let dispatcher_handle = tokio::spawn(dispatcher.run(alert_rx));

    // ── 5. Scanner & scheduler ───────────────────────────────────────────
    let scanner = Arc::new(Scanner::new(
        settings.clone(),
        debounce.clone(),
        client.clone(),
        store.clone(),
        alert_tx,
        ScanOptions::from(&config),
    ));
    let scheduler = Arc::new(ScanScheduler::new(scanner, config.scan_period()));

    if config.autostart {
        scheduler.start();
    } else {
        info!("Autostart disabled, scanner is Idle until started via the API");
    }

    // ── 6. API server ────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config.clone(),
        settings,
        scheduler.clone(),
        alert_log,
        client,
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    let app = api::rest::router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping gracefully");

    scheduler.stop();
    if let Err(e) = debounce.save(&*store) {
        error!(error = %e, "Failed to save debounce records on shutdown");
    }

    // The scheduler still owns a sender, so the dispatcher would not drain on
    // its own; give in-flight alerts a moment before exiting.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), dispatcher_handle).await;

    info!("Signal Scanner shut down complete.");
    Ok(())
}
