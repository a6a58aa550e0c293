use super::state::{SessionInfo, SessionState};
use crate::channel::{signaling, StreamInfo};
use crate::context::RelayContext;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Live sessions by meeting_uuid
pub type SessionMap = Arc<Mutex<HashMap<String, Session>>>;

/// One meeting's relay: a signaling channel and, once negotiated, a media channel
pub struct Session {
    stream: StreamInfo,

    /// Distinguishes successive sessions for the same meeting
    instance: Uuid,

    started_at: DateTime<Utc>,

    /// Cancels both channels
    cancel: CancellationToken,

    state: watch::Receiver<SessionState>,

    task: JoinHandle<()>,
}

impl Session {
    /// Start the signaling channel for a meeting stream.
    ///
    /// When the session ends on its own it removes itself from `registry`,
    /// provided the registered entry is still this instance.
    pub(crate) fn spawn(
        ctx: Arc<RelayContext>,
        registry: SessionMap,
        stream: StreamInfo,
        endpoint: String,
    ) -> Self {
        let instance = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);

        let span = info_span!(
            "session",
            meeting_uuid = %stream.meeting_uuid,
            stream_id = %stream.stream_id
        );
        let task = tokio::spawn(
            supervise(
                ctx,
                registry,
                stream.clone(),
                endpoint,
                cancel.clone(),
                state_tx,
                instance,
            )
            .instrument(span),
        );

        Self {
            stream,
            instance,
            started_at: Utc::now(),
            cancel,
            state: state_rx,
            task,
        }
    }

    pub fn meeting_uuid(&self) -> &str {
        &self.stream.meeting_uuid
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            meeting_uuid: self.stream.meeting_uuid.clone(),
            stream_id: self.stream.stream_id.clone(),
            state: self.state(),
            started_at: self.started_at,
        }
    }

    /// Ask both channels to close; pending reads are abandoned
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for both channels to finish
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            error!("Session task for {} panicked: {}", self.stream.meeting_uuid, e);
        }
    }
}

async fn supervise(
    ctx: Arc<RelayContext>,
    registry: SessionMap,
    stream: StreamInfo,
    endpoint: String,
    cancel: CancellationToken,
    state_tx: watch::Sender<SessionState>,
    instance: Uuid,
) {
    let outcome = signaling::run(ctx, stream.clone(), endpoint, cancel, state_tx.clone()).await;

    let final_state = match outcome {
        Ok(()) => {
            info!("Session closed");
            SessionState::Closed
        }
        Err(e) => {
            error!("Session failed: {}", e);
            SessionState::Failed(e.to_string())
        }
    };

    {
        let mut sessions = registry.lock().await;
        if sessions.get(&stream.meeting_uuid).map(Session::instance) == Some(instance) {
            sessions.remove(&stream.meeting_uuid);
        }
    }

    // Published last so observers see the registry already updated
    state_tx.send_replace(final_state);
}
