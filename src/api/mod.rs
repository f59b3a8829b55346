// HTTP control surface and render event stream

pub mod websocket;

pub use websocket::ws_handler;

use crate::dispatch::{DispatchClosed, Dispatcher};
use crate::playback::{clamp_interval, PlaybackStatus};
use crate::render::{BroadcastRenderer, RenderEvent};
use crate::visualizer::Visualizer;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// API configuration (`[api]` section)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Render events buffered per WebSocket client before it lags
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_event_buffer() -> usize {
    1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind_addr: default_bind_addr(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Producer handle for commands against the running visualizer.
pub type ControlDispatcher = Dispatcher<Visualizer<BroadcastRenderer>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: ControlDispatcher,
    /// Latest status published by the consumer loop
    pub status: watch::Receiver<PlaybackStatus>,
    pub events: broadcast::Sender<RenderEvent>,
    pub min_tick_interval: Duration,
}

/// Accepted command response
#[derive(Serialize)]
struct CommandResponse {
    command: &'static str,
}

#[derive(Deserialize)]
struct IntervalRequest {
    seconds: f64,
}

#[derive(Serialize)]
struct IntervalResponse {
    requested_seconds: f64,
    effective_seconds: f64,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create API router with playback control and event stream endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/playback", get(get_status))
        .route("/api/playback/start", post(start_playback))
        .route("/api/playback/stop", post(stop_playback))
        .route("/api/playback/interval", put(set_interval))
        .route("/api/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /api/playback - Current playback status
async fn get_status(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.status.borrow().clone())
}

/// POST /api/playback/start - Restart playback from the first timestep
async fn start_playback(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    state.dispatcher.enqueue(|v| {
        v.start();
    })?;
    info!("Start command queued");
    Ok(accepted("start"))
}

/// POST /api/playback/stop - Pause playback
async fn stop_playback(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    state.dispatcher.enqueue(|v| v.stop())?;
    info!("Stop command queued");
    Ok(accepted("stop"))
}

/// PUT /api/playback/interval - Change seconds per timestep
async fn set_interval(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: IntervalRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    if !request.seconds.is_finite() || request.seconds <= 0.0 {
        return Err(AppError::ValidationError(
            "seconds must be a positive number".to_string(),
        ));
    }

    let seconds = request.seconds;
    let effective = clamp_interval(seconds, state.min_tick_interval);
    state.dispatcher.enqueue(move |v| {
        v.set_tick_interval(seconds);
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IntervalResponse {
            requested_seconds: seconds,
            effective_seconds: effective.as_secs_f64(),
        }),
    )
        .into_response())
}

fn accepted(command: &'static str) -> Response {
    (StatusCode::ACCEPTED, Json(CommandResponse { command })).into_response()
}

/// Application error type
#[derive(Debug)]
enum AppError {
    ValidationError(String),
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "playback loop is not running".to_string(),
            ),
        };
        let body = Json(ErrorResponse {
            error: error_message,
        });
        (status, body).into_response()
    }
}

impl From<DispatchClosed> for AppError {
    fn from(e: DispatchClosed) -> Self {
        warn!(error = %e, "Command rejected");
        AppError::Unavailable
    }
}
