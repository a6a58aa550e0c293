use crate::session::SessionCoordinator;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live RTMS sessions (meeting_uuid → session)
    pub coordinator: SessionCoordinator,
}

impl AppState {
    pub fn new(coordinator: SessionCoordinator) -> Self {
        Self { coordinator }
    }
}
