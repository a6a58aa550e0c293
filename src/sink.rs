use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One decoded transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Meeting the line belongs to
    pub meeting_uuid: String,

    /// Speaker id, when the service sends one
    #[serde(default)]
    pub user_id: Option<String>,

    /// Speaker display name
    pub user_name: String,

    /// Transcribed text
    pub text: String,

    /// Sender timestamp in milliseconds, if the service sent one
    pub timestamp: Option<u64>,
}

/// Consumer of transcript events
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn deliver(&self, event: TranscriptEvent);
}

/// Logs each line as `user: text`
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl TranscriptSink for LogSink {
    async fn deliver(&self, event: TranscriptEvent) {
        info!(meeting_uuid = %event.meeting_uuid, "{}: {}", event.user_name, event.text);
        if let Some(ts) = event.timestamp {
            debug!(meeting_uuid = %event.meeting_uuid, "Sent at: {}", ts);
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TranscriptEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TranscriptEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TranscriptSink for ChannelSink {
    async fn deliver(&self, event: TranscriptEvent) {
        if self.tx.send(event).is_err() {
            debug!("Transcript receiver dropped; discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        let event = TranscriptEvent {
            meeting_uuid: "m1".to_string(),
            user_id: Some("16778240".to_string()),
            user_name: "Alice".to_string(),
            text: "hello".to_string(),
            timestamp: Some(42),
        };

        sink.deliver(event.clone()).await;

        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        sink.deliver(TranscriptEvent {
            meeting_uuid: "m1".to_string(),
            user_id: None,
            user_name: "Bob".to_string(),
            text: "anyone there?".to_string(),
            timestamp: None,
        })
        .await;
    }
}
