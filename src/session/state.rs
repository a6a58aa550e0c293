use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, signaling connection not yet open
    Starting,
    /// Signaling handshake in flight
    Signaling,
    /// Media handshake in flight
    Negotiating,
    /// CLIENT_READY_ACK requested; transcript frames flowing
    Streaming,
    /// Stopped or closed without error
    Closed,
    /// Ended by a protocol or transport failure
    Failed(String),
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub meeting_uuid: String,
    pub stream_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
}
