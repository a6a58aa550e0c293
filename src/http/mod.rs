//! HTTP surface for the Zoom webhook
//!
//! - POST /webhook - Lifecycle events (`meeting.rtms_started`, `meeting.rtms_stopped`)
//! - GET /sessions - List live sessions
//! - GET /sessions/:meeting_uuid - Query one session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
