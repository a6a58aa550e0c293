// In-memory transport for driving sessions from tests
//
// Every `connect` call hands the test a `RemoteEnd`: the frames the relay
// wrote, and a sender for frames the "server" pushes back.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use rtms_relay::{
    ChannelSink, Connection, Connector, Credentials, FrameSink, RelayContext, RelaySettings,
    SessionCoordinator, TranscriptEvent, TranscriptSink, TransportEvent,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(150);

/// What the relay wrote on a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Text(String),
    Close,
}

pub struct RemoteEnd {
    pub url: String,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    incoming: mpsc::Sender<TransportEvent>,
}

impl RemoteEnd {
    /// Next frame the relay wrote; `None` once the connection is gone
    pub async fn next_frame(&mut self) -> Option<Outgoing> {
        tokio::time::timeout(WAIT, self.outgoing.recv())
            .await
            .expect("timed out waiting for an outbound frame")
    }

    /// Next frame, which must be a JSON text frame
    pub async fn next_json(&mut self) -> Value {
        match self.next_frame().await {
            Some(Outgoing::Text(text)) => serde_json::from_str(&text).expect("frame is not JSON"),
            other => panic!("expected a text frame on {}, got {:?}", self.url, other),
        }
    }

    /// Assert nothing is written for a short while
    pub async fn assert_silent(&mut self) {
        if let Ok(frame) = tokio::time::timeout(QUIET, self.outgoing.recv()).await {
            panic!("expected no frame on {}, got {:?}", self.url, frame);
        }
    }

    /// Wait until the relay closes or drops the connection
    pub async fn expect_closed(&mut self) {
        loop {
            match self.next_frame().await {
                Some(Outgoing::Close) | None => return,
                Some(Outgoing::Text(text)) => {
                    panic!("expected close on {}, got frame {}", self.url, text)
                }
            }
        }
    }

    pub async fn send_json(&self, value: Value) {
        self.send_text(value.to_string()).await;
    }

    pub async fn send_text(&self, text: impl Into<String>) {
        let _ = self.incoming.send(TransportEvent::Text(text.into())).await;
    }

    pub async fn hang_up(&self) {
        let _ = self
            .incoming
            .send(TransportEvent::Closed(Some("bye".to_string())))
            .await;
    }
}

struct MockSink {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    stalled: bool,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.stalled {
            // Write half wedged, e.g. a full TCP send buffer
            std::future::pending::<()>().await;
        }
        if self.outgoing.send(Outgoing::Text(text)).is_err() {
            bail!("remote end dropped");
        }
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

#[derive(Clone)]
pub struct MockConnector {
    accepted: mpsc::UnboundedSender<RemoteEnd>,
    refused: Arc<Mutex<HashSet<String>>>,
    stalled: Arc<Mutex<HashSet<String>>>,
    open: Arc<watch::Sender<bool>>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RemoteEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (open, _) = watch::channel(true);
        (
            Self {
                accepted: tx,
                refused: Arc::new(Mutex::new(HashSet::new())),
                stalled: Arc::new(Mutex::new(HashSet::new())),
                open: Arc::new(open),
            },
            rx,
        )
    }

    /// Make connections to `url` fail
    pub fn refuse(&self, url: &str) {
        self.refused.lock().unwrap().insert(url.to_string());
    }

    /// Connections to `url` open, but every write on them blocks forever
    pub fn stall_writes(&self, url: &str) {
        self.stalled.lock().unwrap().insert(url.to_string());
    }

    /// Park every `connect` call until `release`
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let mut open = self.open.subscribe();
        if open.wait_for(|open| *open).await.is_err() {
            bail!("test harness dropped");
        }

        if self.refused.lock().unwrap().contains(url) {
            bail!("connection refused: {}", url);
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(64);

        let remote = RemoteEnd {
            url: url.to_string(),
            outgoing: out_rx,
            incoming: in_tx,
        };
        if self.accepted.send(remote).is_err() {
            bail!("test harness dropped");
        }

        Ok(Connection {
            sink: Box::new(MockSink {
                outgoing: out_tx,
                stalled: self.stalled.lock().unwrap().contains(url),
            }),
            events: in_rx,
        })
    }
}

pub struct Harness {
    pub coordinator: SessionCoordinator,
    pub connector: MockConnector,
    pub accepted: mpsc::UnboundedReceiver<RemoteEnd>,
    pub transcripts: mpsc::UnboundedReceiver<TranscriptEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RelaySettings {
            handshake_timeout_secs: 30,
            close_grace_ms: 100,
        })
    }

    pub fn with_settings(settings: RelaySettings) -> Self {
        let (sink, transcripts) = ChannelSink::new();
        Self::build(settings, Arc::new(sink), transcripts)
    }

    /// Harness whose transcripts go to `sink`; `transcripts` stays empty
    pub fn with_sink(sink: Arc<dyn TranscriptSink>) -> Self {
        let (_, transcripts) = mpsc::unbounded_channel();
        Self::build(
            RelaySettings {
                handshake_timeout_secs: 30,
                close_grace_ms: 100,
            },
            sink,
            transcripts,
        )
    }

    fn build(
        settings: RelaySettings,
        sink: Arc<dyn TranscriptSink>,
        transcripts: mpsc::UnboundedReceiver<TranscriptEvent>,
    ) -> Self {
        let (connector, accepted) = MockConnector::new();
        let ctx = RelayContext::new(
            Credentials::new("client", "secret").unwrap(),
            Arc::new(connector.clone()),
            sink,
            settings,
        );

        Self {
            coordinator: SessionCoordinator::new(ctx),
            connector,
            accepted,
            transcripts,
        }
    }

    /// Next connection the relay opened
    pub async fn accept(&mut self) -> RemoteEnd {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub async fn next_transcript(&mut self) -> TranscriptEvent {
        tokio::time::timeout(WAIT, self.transcripts.recv())
            .await
            .expect("timed out waiting for a transcript")
            .expect("sink dropped")
    }

    /// Drive a session up to streaming; returns (signaling, media)
    pub async fn establish(
        &mut self,
        meeting_uuid: &str,
        stream_id: &str,
        media_url: &str,
    ) -> (RemoteEnd, RemoteEnd) {
        self.coordinator
            .on_start(meeting_uuid, stream_id, "sig://A")
            .await;

        let mut signaling = self.accept().await;
        assert_eq!(signaling.next_json().await["msg_type"], 1);
        signaling.send_json(signaling_ok(media_url)).await;

        let mut media = self.accept().await;
        assert_eq!(media.url, media_url);
        assert_eq!(media.next_json().await["msg_type"], 3);
        media
            .send_json(serde_json::json!({"msg_type": 4, "status_code": 0}))
            .await;

        assert_eq!(signaling.next_json().await["msg_type"], 7);
        (signaling, media)
    }
}

pub fn signaling_ok(media_url: &str) -> Value {
    serde_json::json!({
        "msg_type": 2,
        "status_code": 0,
        "media_server": {"server_urls": {"transcript": media_url}}
    })
}

pub fn transcript(user: &str, text: &str) -> Value {
    serde_json::json!({
        "msg_type": 17,
        "content": {
            "user_id": 16778240,
            "user_name": user,
            "data": text,
            "timestamp": 1727712345678u64
        }
    })
}

/// Sink whose `deliver` never completes
pub struct StalledSink;

#[async_trait]
impl TranscriptSink for StalledSink {
    async fn deliver(&self, _event: TranscriptEvent) {
        std::future::pending::<()>().await;
    }
}
