//! Signaling and media channel state machines
//!
//! Each channel is a pure state machine (`SignalingMachine`, `MediaMachine`)
//! that turns inbound messages into actions, plus an actor task that owns
//! the connection and carries those actions out. Keep-alives are answered
//! by whichever actor observed the request, on its own connection.

pub mod media;
pub mod signaling;

use crate::error::{ChannelRole, RelayError, Result};
use crate::protocol::Outbound;
use crate::transport::FrameSink;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use media::{MediaAction, MediaMachine, MediaState};
pub use signaling::{SignalingAction, SignalingMachine, SignalingState};

/// The meeting stream a channel belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub meeting_uuid: String,
    pub stream_id: String,
}

impl StreamInfo {
    pub fn new(meeting_uuid: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            meeting_uuid: meeting_uuid.into(),
            stream_id: stream_id.into(),
        }
    }
}

/// Requests the media actor makes of its signaling actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingCommand {
    /// Media handshake succeeded; emit CLIENT_READY_ACK on signaling
    ClientReady,
}

pub(crate) async fn send_frame(
    sink: &mut Box<dyn FrameSink>,
    role: ChannelRole,
    message: &Outbound,
) -> Result<()> {
    let text = message.encode()?;
    debug!("--> {} msg_type={}", role, message.msg_type());
    sink.send_text(text)
        .await
        .map_err(|e| RelayError::transport(role, e))
}

/// Run `fut` unless `cancel` fires first; the abandoned future is dropped
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

pub(crate) async fn close_sink(sink: &mut Box<dyn FrameSink>, grace: Duration) {
    if tokio::time::timeout(grace, sink.close()).await.is_err() {
        debug!("Close did not complete within {:?}", grace);
    }
}
