use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Zoom webhook events
        .route("/webhook", post(handlers::webhook))
        // Session queries
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:meeting_uuid", get(handlers::get_session))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
