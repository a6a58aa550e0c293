use super::state::AppState;
use crate::session::LifecycleEvent;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub event: String,

    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /webhook
/// Receive a lifecycle event. Always acknowledged; failures only show in logs.
pub async fn webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Ignoring undecodable webhook body: {}", e);
            return StatusCode::OK;
        }
    };

    match LifecycleEvent::from_webhook(&request.event, request.payload) {
        Ok(event) => {
            info!("Webhook event: {}", request.event);
            state.coordinator.handle(event).await;
        }
        Err(e) => warn!("Ignoring webhook event {}: {}", request.event, e),
    }

    StatusCode::OK
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.active_sessions().await)
}

/// GET /sessions/:meeting_uuid
pub async fn get_session(
    State(state): State<AppState>,
    Path(meeting_uuid): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.session_info(&meeting_uuid).await {
        Some(info) => (StatusCode::OK, Json(info)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Meeting {} has no live session", meeting_uuid),
            }),
        )
            .into_response(),
    }
}

/// GET /
pub async fn root() -> impl IntoResponse {
    "Zoom RTMS relay is up and running."
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
