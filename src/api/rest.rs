// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Control surface for the scanner.  All endpoints live under `/api/v1/`.
// Every mutation goes through the settings service, so the same validation
// and persistence rules apply as everywhere else.
//
// Status mapping: validation failures 400, upstream data problems 502,
// persistence failures 500.
//
// CORS is configured permissively; put the API behind a reverse proxy when
// exposing it beyond localhost.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::{ScanError, SettingsError, ValidationError};
use crate::market_data::SeriesKey;
use crate::settings::normalize_symbol;
use crate::signals::Classification;
use crate::types::{Interval, ScannerState};

/// Number of symbols returned by the top-movers endpoint.
const TOP_MOVERS: usize = 10;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        // ── Thresholds ──────────────────────────────────────────────
        .route("/api/v1/thresholds", post(update_threshold))
        .route("/api/v1/thresholds/reset", post(reset_thresholds))
        // ── Watch-list & mutes ──────────────────────────────────────
        .route("/api/v1/watchlist", post(add_symbol))
        .route("/api/v1/watchlist/:symbol", delete(remove_symbol))
        .route("/api/v1/watchlist/:symbol/intervals", post(set_intervals))
        .route("/api/v1/mute/:symbol", post(mute_symbol).delete(unmute_symbol))
        // ── Scheduler ───────────────────────────────────────────────
        .route("/api/v1/scanner/start", post(scanner_start))
        .route("/api/v1/scanner/stop", post(scanner_stop))
        // ── Market views ────────────────────────────────────────────
        .route("/api/v1/analysis/:symbol/:interval", get(analysis))
        .route("/api/v1/alerts", get(recent_alerts))
        .route("/api/v1/top-movers", get(top_movers))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Upstream(String),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Validation(v) => Self::Validation(v),
            other => Self::Internal(format!("{other:#}")),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Record server-side failures before they are returned.
fn track(state: &AppState, err: ApiError) -> ApiError {
    match &err {
        ApiError::Validation(_) => {}
        ApiError::Upstream(msg) | ApiError::Internal(msg) => {
            warn!(error = %msg, "API request failed");
            state.push_error(msg.clone());
        }
    }
    err
}

// =============================================================================
// Health & state
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    scanner_state: ScannerState,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        scanner_state: state.scheduler.state(),
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Thresholds
// =============================================================================

#[derive(Debug, Deserialize)]
struct ThresholdUpdate {
    key: String,
    value: f64,
}

async fn update_threshold(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<impl IntoResponse> {
    let thresholds = state
        .settings
        .update_threshold(&update.key, update.value)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(thresholds))
}

async fn reset_thresholds(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let thresholds = state
        .settings
        .reset_thresholds()
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(thresholds))
}

// =============================================================================
// Watch-list & mutes
// =============================================================================

#[derive(Debug, Deserialize)]
struct SymbolRequest {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct IntervalsRequest {
    intervals: Vec<String>,
}

async fn add_symbol(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = state
        .settings
        .add_symbol(&req.symbol)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "symbol": symbol })),
    ))
}

async fn remove_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let symbol = state
        .settings
        .remove_symbol(&symbol)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(serde_json::json!({ "symbol": symbol, "removed": true })))
}

async fn set_intervals(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Json(req): Json<IntervalsRequest>,
) -> ApiResult<impl IntoResponse> {
    let intervals = req
        .intervals
        .iter()
        .map(|s| s.parse::<Interval>())
        .collect::<Result<Vec<_>, _>>()?;
    let applied = state
        .settings
        .set_symbol_intervals(&symbol, &intervals)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(serde_json::json!({
        "symbol": normalize_symbol(&symbol)?,
        "intervals": applied,
    })))
}

async fn mute_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let changed = state
        .settings
        .mute_symbol(&symbol)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(serde_json::json!({
        "symbol": normalize_symbol(&symbol)?,
        "muted": true,
        "changed": changed,
    })))
}

async fn unmute_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let changed = state
        .settings
        .unmute_symbol(&symbol)
        .map_err(|e| track(&state, e.into()))?;
    state.increment_version();
    Ok(Json(serde_json::json!({
        "symbol": normalize_symbol(&symbol)?,
        "muted": false,
        "changed": changed,
    })))
}

// =============================================================================
// Scheduler control
// =============================================================================

#[derive(Serialize)]
struct ControlResponse {
    scanner_state: ScannerState,
    changed: bool,
}

async fn scanner_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let changed = state.scheduler.start();
    if changed {
        info!("scanner started via API");
        state.increment_version();
    }
    Json(ControlResponse {
        scanner_state: state.scheduler.state(),
        changed,
    })
}

async fn scanner_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let changed = state.scheduler.stop();
    if changed {
        info!("scanner stopped via API");
        state.increment_version();
    }
    Json(ControlResponse {
        scanner_state: state.scheduler.state(),
        changed,
    })
}

// =============================================================================
// Market views
// =============================================================================

#[derive(Serialize)]
struct AnalysisResponse {
    symbol: String,
    interval: Interval,
    muted: bool,
    last_fired: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    classification: Classification,
}

/// On-demand classification of one unit.  Never emits an alert and never
/// touches the debounce store.
async fn analysis(
    State(state): State<Arc<AppState>>,
    Path((symbol, interval)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let symbol = normalize_symbol(&symbol)?;
    let interval: Interval = interval.parse()?;
    let key = SeriesKey::new(symbol.clone(), interval);

    let settings = state.settings.snapshot();
    let scanner = state.scheduler.scanner();
    let classification = scanner
        .evaluate(&key, &settings.thresholds)
        .await
        .map_err(|e| track(&state, e.into()))?;

    Ok(Json(AnalysisResponse {
        muted: settings.muted.is_muted(&symbol),
        last_fired: scanner.debounce().last_fired(&key),
        symbol,
        interval,
        classification,
    }))
}

/// Recently dispatched alerts, newest first.
async fn recent_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut alerts = state.alert_log.recent();
    alerts.reverse();
    Json(alerts)
}

async fn top_movers(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let movers = state
        .market
        .top_movers(TOP_MOVERS)
        .await
        .map_err(|e| track(&state, ApiError::Upstream(format!("{e:#}"))))?;
    Ok(Json(movers))
}
