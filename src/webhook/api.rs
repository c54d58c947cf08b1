use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::delivery::OutboundWebhook;
use crate::errors::PipelineError;
use crate::llm::Summarizer;
use crate::platform::ChatPlatform;
use crate::summary::{PayloadSettings, SummaryRequest, summary_from_payload};

/// Returned in place of a summary that did not finish in time.
pub const TIMEOUT_MESSAGE: &str = "Timeout error occurred while processing the summary.";

pub const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 10;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub platform: Arc<dyn ChatPlatform>,
    pub summarizer: Arc<dyn Summarizer>,
    pub outbound: OutboundWebhook,
    pub payload_settings: PayloadSettings,
    pub summary_timeout: Duration,
}

impl AppState {
    pub fn new(platform: Arc<dyn ChatPlatform>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            platform,
            summarizer,
            outbound: OutboundWebhook::default(),
            payload_settings: PayloadSettings::default(),
            summary_timeout: Duration::from_secs(DEFAULT_SUMMARY_TIMEOUT_SECS),
        }
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => ApiError::BadRequest(e.to_string()),
            PipelineError::Chunk(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Run the payload summary under the configured timeout. On expiry the
/// fixed [`TIMEOUT_MESSAGE`] is returned and partial output is dropped.
pub async fn summarize_with_timeout(
    state: &AppState,
    request: &SummaryRequest,
) -> Result<String, PipelineError> {
    let work = summary_from_payload(
        state.platform.as_ref(),
        state.summarizer.as_ref(),
        request,
        Utc::now(),
        &state.payload_settings,
    );
    match tokio::time::timeout(state.summary_timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout = ?state.summary_timeout, "Summary timed out");
            Ok(TIMEOUT_MESSAGE.to_string())
        }
    }
}

async fn receive_webhook(
    State(state): State<SharedState>,
    Json(raw): Json<Value>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    handle_webhook(&state, raw)
        .instrument(info_span!("webhook", %request_id))
        .await
        .map(Json)
}

async fn handle_webhook(state: &AppState, raw: Value) -> Result<WebhookResponse, ApiError> {
    info!(payload = %raw, "Received webhook payload");
    let request: SummaryRequest = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid payload: {}", e)))?;

    let message = summarize_with_timeout(state, &request).await?;

    match request.target_webhook.as_deref().filter(|t| !t.is_empty()) {
        Some(target) => match state.outbound.send(&message, target, &raw).await {
            Ok(status) => info!(target, status, "Sent message to target webhook"),
            Err(e) => warn!(target, error = %e, "Failed to forward to target webhook"),
        },
        None => info!("No target webhook provided"),
    }

    Ok(WebhookResponse { message })
}

// ── Tests ─────────────────────────────────────────────────────────────
