use super::events::LifecycleEvent;
use super::session::{Session, SessionMap};
use super::state::{SessionInfo, SessionState};
use crate::channel::StreamInfo;
use crate::context::RelayContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotFound,
}

/// Registry of live sessions keyed by meeting_uuid
///
/// Every create and delete happens under a single registry lock, so
/// concurrent start/stop events for one meeting are applied one at a time.
/// The lock is never held across network I/O: channels run in their own
/// tasks and only take the lock to deregister themselves.
#[derive(Clone)]
pub struct SessionCoordinator {
    ctx: Arc<RelayContext>,
    sessions: SessionMap,
}

impl SessionCoordinator {
    pub fn new(ctx: RelayContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a session and start its signaling channel
    pub async fn on_start(
        &self,
        meeting_uuid: &str,
        stream_id: &str,
        endpoint: &str,
    ) -> StartOutcome {
        let mut sessions = self.sessions.lock().await;

        if sessions.contains_key(meeting_uuid) {
            warn!("Meeting {} already has a live session; ignoring start", meeting_uuid);
            return StartOutcome::AlreadyRunning;
        }

        info!("Starting RTMS session for meeting {}", meeting_uuid);
        let session = Session::spawn(
            Arc::clone(&self.ctx),
            Arc::clone(&self.sessions),
            StreamInfo::new(meeting_uuid, stream_id),
            endpoint.to_string(),
        );
        sessions.insert(meeting_uuid.to_string(), session);

        StartOutcome::Started
    }

    /// Close both channels of a meeting's session and forget it
    pub async fn on_stop(&self, meeting_uuid: &str) -> StopOutcome {
        let session = self.sessions.lock().await.remove(meeting_uuid);

        match session {
            Some(session) => {
                info!("Stopping RTMS session for meeting {}", meeting_uuid);
                session.stop();
                StopOutcome::Stopped
            }
            None => {
                info!("No live session for meeting {}; ignoring stop", meeting_uuid);
                StopOutcome::NotFound
            }
        }
    }

    pub async fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Started {
                meeting_uuid,
                stream_id,
                endpoint,
            } => {
                self.on_start(&meeting_uuid, &stream_id, &endpoint).await;
            }
            LifecycleEvent::Stopped { meeting_uuid } => {
                self.on_stop(&meeting_uuid).await;
            }
            LifecycleEvent::Unknown(kind) => {
                info!("Unknown event: {}", kind);
            }
        }
    }

    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut infos: Vec<SessionInfo> = sessions.values().map(Session::info).collect();
        infos.sort_by(|a, b| a.meeting_uuid.cmp(&b.meeting_uuid));
        infos
    }

    pub async fn session_info(&self, meeting_uuid: &str) -> Option<SessionInfo> {
        self.sessions.lock().await.get(meeting_uuid).map(Session::info)
    }

    pub async fn session_state(&self, meeting_uuid: &str) -> Option<SessionState> {
        self.sessions.lock().await.get(meeting_uuid).map(Session::state)
    }

    /// Watch a live session's state
    pub async fn subscribe(&self, meeting_uuid: &str) -> Option<watch::Receiver<SessionState>> {
        self.sessions
            .lock()
            .await
            .get(meeting_uuid)
            .map(Session::subscribe)
    }

    /// Stop every session and wait for their channels to close
    pub async fn shutdown(&self) {
        let drained: Vec<Session> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        info!("Shutting down {} session(s)", drained.len());
        for session in drained {
            session.shutdown().await;
        }
    }
}
