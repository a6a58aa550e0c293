use crate::error::{RelayError, Result};
use serde::Deserialize;
use serde_json::Value;

pub const RTMS_STARTED: &str = "meeting.rtms_started";
pub const RTMS_STOPPED: &str = "meeting.rtms_stopped";

/// Meeting lifecycle notification from the webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started {
        meeting_uuid: String,
        stream_id: String,
        /// Signaling endpoint, treated as an opaque reference
        endpoint: String,
    },
    Stopped {
        meeting_uuid: String,
    },
    /// Any other event kind
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct StartedPayload {
    meeting_uuid: String,
    rtms_stream_id: String,
    server_urls: String,
}

#[derive(Debug, Deserialize)]
struct StoppedPayload {
    meeting_uuid: String,
}

impl LifecycleEvent {
    /// Interpret a webhook `{event, payload}` pair
    pub fn from_webhook(event: &str, payload: Value) -> Result<Self> {
        match event {
            RTMS_STARTED => {
                let p: StartedPayload = serde_json::from_value(payload)
                    .map_err(|e| RelayError::Malformed(format!("{} payload: {}", event, e)))?;
                Ok(LifecycleEvent::Started {
                    meeting_uuid: p.meeting_uuid,
                    stream_id: p.rtms_stream_id,
                    endpoint: p.server_urls,
                })
            }
            RTMS_STOPPED => {
                let p: StoppedPayload = serde_json::from_value(payload)
                    .map_err(|e| RelayError::Malformed(format!("{} payload: {}", event, e)))?;
                Ok(LifecycleEvent::Stopped {
                    meeting_uuid: p.meeting_uuid,
                })
            }
            other => Ok(LifecycleEvent::Unknown(other.to_string())),
        }
    }
}
