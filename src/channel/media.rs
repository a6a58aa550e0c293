use super::{close_sink, send_frame, until_cancelled, SignalingCommand, StreamInfo};
use crate::context::RelayContext;
use crate::error::{ChannelRole, RelayError, Result};
use crate::protocol::{Inbound, MediaTypes, Outbound};
use crate::session::SessionState;
use crate::signature::Credentials;
use crate::sink::{TranscriptEvent, TranscriptSink};
use crate::transport::{Connection, TransportEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

const ROLE: ChannelRole = ChannelRole::Media;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Connecting,
    AwaitingHandshakeAck,
    ReadyAckSent,
    Streaming,
    Closed,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaAction {
    /// Write a message on the media connection
    Send(Outbound),
    /// Ask the signaling channel to emit CLIENT_READY_ACK
    SignalClientReady,
    /// Hand a transcript line to the sink
    Deliver(TranscriptEvent),
    /// Terminal failure; tear the session down
    Fail(RelayError),
}

/// Negotiates the data stream and decodes transcript frames
pub struct MediaMachine {
    stream: StreamInfo,
    credentials: Credentials,
    media_types: MediaTypes,
    state: MediaState,
}

impl MediaMachine {
    /// Machine requesting transcript data only
    pub fn new(stream: StreamInfo, credentials: Credentials) -> Self {
        Self::with_media_types(stream, credentials, MediaTypes::TRANSCRIPT)
    }

    pub fn with_media_types(
        stream: StreamInfo,
        credentials: Credentials,
        media_types: MediaTypes,
    ) -> Self {
        Self {
            stream,
            credentials,
            media_types,
            state: MediaState::Connecting,
        }
    }

    pub fn state(&self) -> MediaState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, MediaState::Closed | MediaState::Error)
    }

    pub fn awaiting_ack(&self) -> bool {
        self.state == MediaState::AwaitingHandshakeAck
    }

    /// Data handshake request; must be the first frame on a new connection
    pub fn on_open(&mut self) -> Result<Outbound> {
        let signature = self
            .credentials
            .sign(&self.stream.meeting_uuid, &self.stream.stream_id)
            .map_err(|e| self.fail(e))?;

        self.state = MediaState::AwaitingHandshakeAck;
        Ok(Outbound::data_handshake(
            &self.stream.meeting_uuid,
            &self.stream.stream_id,
            signature,
            self.media_types,
        ))
    }

    pub fn on_message(&mut self, message: Inbound) -> Vec<MediaAction> {
        if self.is_terminal() {
            return Vec::new();
        }

        match message {
            Inbound::KeepAliveReq(req) => {
                debug!("KEEP_ALIVE_REQ on media, echoing {}", req.timestamp);
                vec![MediaAction::Send(Outbound::keep_alive_resp(req.timestamp))]
            }
            Inbound::DataHandshakeResp(resp) if self.awaiting_ack() => {
                if resp.status_code != 0 {
                    warn!(
                        "Media handshake rejected: status={} reason={:?}",
                        resp.status_code, resp.reason
                    );
                    let err = self.fail(RelayError::Protocol {
                        channel: ROLE,
                        status_code: resp.status_code,
                    });
                    return vec![MediaAction::Fail(err)];
                }

                self.state = MediaState::ReadyAckSent;
                vec![MediaAction::SignalClientReady]
            }
            Inbound::DataHandshakeResp(_) => {
                warn!("Ignoring data handshake response in state {:?}", self.state);
                Vec::new()
            }
            Inbound::Transcript(transcript) => match self.state {
                MediaState::ReadyAckSent | MediaState::Streaming => {
                    self.state = MediaState::Streaming;
                    let content = transcript.content;
                    vec![MediaAction::Deliver(TranscriptEvent {
                        meeting_uuid: self.stream.meeting_uuid.clone(),
                        user_id: content.user_id,
                        user_name: content.user_name,
                        text: content.data,
                        timestamp: content.timestamp,
                    })]
                }
                _ => {
                    warn!("Dropping transcript received before media handshake completed");
                    Vec::new()
                }
            },
            Inbound::Unknown(msg_type) => {
                debug!("Ignoring media msg_type={}", msg_type);
                Vec::new()
            }
            other => {
                debug!("Ignoring unexpected message on media: {:?}", other);
                Vec::new()
            }
        }
    }

    pub fn on_closed(&mut self) {
        if !self.is_terminal() {
            self.state = MediaState::Closed;
        }
    }

    pub fn fail(&mut self, err: RelayError) -> RelayError {
        self.state = MediaState::Error;
        err
    }
}

/// Transcripts queued for the sink before the media actor waits on it
const DELIVERY_BUFFER: usize = 64;

/// Drive one session's media channel until cancelled, failed or closed.
pub(crate) async fn run(
    ctx: Arc<RelayContext>,
    stream: StreamInfo,
    url: String,
    cancel: CancellationToken,
    signaling: mpsc::Sender<SignalingCommand>,
    state_tx: watch::Sender<SessionState>,
) -> Result<()> {
    let mut machine = MediaMachine::new(stream, ctx.credentials.clone());

    info!("Connecting media channel to {}", url);
    let Connection {
        mut sink,
        mut events,
    } = tokio::select! {
        _ = cancel.cancelled() => {
            machine.on_closed();
            return Ok(());
        }
        conn = ctx.connector.connect(&url) => {
            conn.map_err(|e| machine.fail(RelayError::transport(ROLE, format!("{:#}", e))))?
        }
    };

    let hello = machine.on_open()?;
    match until_cancelled(&cancel, send_frame(&mut sink, ROLE, &hello)).await {
        Some(sent) => sent.map_err(|e| machine.fail(e))?,
        None => {
            machine.on_closed();
            close_sink(&mut sink, ctx.settings.close_grace()).await;
            return Ok(());
        }
    }
    info!("Media handshake sent");

    // Sink delivery runs off the actor loop
    let (deliveries, queued) = mpsc::channel(DELIVERY_BUFFER);
    let delivery_task = tokio::spawn(
        deliver_transcripts(Arc::clone(&ctx.sink), queued, cancel.clone()).in_current_span(),
    );

    let handshake_deadline = Instant::now() + ctx.settings.handshake_timeout();

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                machine.on_closed();
                break Ok(());
            }
            _ = sleep_until(handshake_deadline), if machine.awaiting_ack() => {
                break Err(machine.fail(RelayError::HandshakeTimeout { channel: ROLE }));
            }
            event = events.recv() => match event {
                Some(TransportEvent::Text(text)) => {
                    let message = match Inbound::decode(&text) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Ignoring media frame: {}", e);
                            continue;
                        }
                    };

                    let mut exit = None;
                    for action in machine.on_message(message) {
                        match action {
                            MediaAction::Send(reply) => {
                                match until_cancelled(&cancel, send_frame(&mut sink, ROLE, &reply))
                                    .await
                                {
                                    Some(Ok(())) => {}
                                    Some(Err(e)) => {
                                        exit = Some(Err(machine.fail(e)));
                                        break;
                                    }
                                    None => {
                                        machine.on_closed();
                                        exit = Some(Ok(()));
                                        break;
                                    }
                                }
                            }
                            MediaAction::SignalClientReady => {
                                info!("Media handshake succeeded");
                                let ready = signaling.send(SignalingCommand::ClientReady);
                                if !matches!(until_cancelled(&cancel, ready).await, Some(Ok(()))) {
                                    // Signaling is already shutting the session down
                                    machine.on_closed();
                                    exit = Some(Ok(()));
                                    break;
                                }
                                state_tx.send_replace(SessionState::Streaming);
                            }
                            MediaAction::Deliver(event) => {
                                match until_cancelled(&cancel, deliveries.send(event)).await {
                                    Some(Ok(())) => {}
                                    Some(Err(_)) => warn!("Delivery task gone; dropping transcript"),
                                    None => {
                                        machine.on_closed();
                                        exit = Some(Ok(()));
                                        break;
                                    }
                                }
                            }
                            MediaAction::Fail(e) => {
                                exit = Some(Err(e));
                                break;
                            }
                        }
                    }
                    if let Some(result) = exit {
                        break result;
                    }
                }
                Some(TransportEvent::Closed(reason)) => {
                    machine.on_closed();
                    break Err(RelayError::transport(
                        ROLE,
                        format!("closed by remote ({})", reason.unwrap_or_default()),
                    ));
                }
                Some(TransportEvent::Error(e)) => {
                    break Err(machine.fail(RelayError::transport(ROLE, e)));
                }
                None => {
                    machine.on_closed();
                    break Err(RelayError::transport(ROLE, "connection dropped"));
                }
            }
        }
    };

    if let Err(e) = &outcome {
        error!("Media channel ended: {}", e);
    }

    close_sink(&mut sink, ctx.settings.close_grace()).await;

    // Queued lines drain unless the session is cancelled
    drop(deliveries);
    if let Err(e) = delivery_task.await {
        error!("Transcript delivery task panicked: {}", e);
    }

    info!("Media channel closed ({:?})", machine.state());
    outcome
}

async fn deliver_transcripts(
    sink: Arc<dyn TranscriptSink>,
    mut queued: mpsc::Receiver<TranscriptEvent>,
    cancel: CancellationToken,
) {
    while let Some(event) = queued.recv().await {
        if until_cancelled(&cancel, sink.deliver(event)).await.is_none() {
            debug!("Abandoning transcript delivery");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::DATA_HANDSHAKE_REQ;
    use serde_json::{json, Number};

    fn machine() -> MediaMachine {
        MediaMachine::new(
            StreamInfo::new("abc", "xyz"),
            Credentials::new("client", "secret").unwrap(),
        )
    }

    fn inbound(value: serde_json::Value) -> Inbound {
        Inbound::decode(&value.to_string()).unwrap()
    }

    fn transcript(user: &str, text: &str) -> Inbound {
        inbound(json!({
            "msg_type": 17,
            "content": {"user_id": 42, "user_name": user, "data": text, "timestamp": 1000}
        }))
    }

    #[test]
    fn test_open_requests_transcript_only() {
        let mut m = machine();
        let hello = m.on_open().unwrap();

        assert_eq!(hello.msg_type(), DATA_HANDSHAKE_REQ);
        let Outbound::DataHandshake(req) = hello else {
            panic!("expected data handshake");
        };
        assert_eq!(req.protocol_version, 1);
        assert_eq!(req.sequence, 0);
        assert_eq!(req.media_type, MediaTypes::TRANSCRIPT);
        assert_eq!(
            req.signature,
            "405555265cbb7e41bc396fb4591a59c11e63e905d985cd07d135484e34904be4"
        );
        assert_eq!(m.state(), MediaState::AwaitingHandshakeAck);
    }

    #[test]
    fn test_custom_media_types_reach_handshake() {
        let mut m = MediaMachine::with_media_types(
            StreamInfo::new("abc", "xyz"),
            Credentials::new("client", "secret").unwrap(),
            MediaTypes::TRANSCRIPT | MediaTypes::CHAT,
        );

        let Outbound::DataHandshake(req) = m.on_open().unwrap() else {
            panic!("expected data handshake");
        };
        assert_eq!(req.media_type.bits(), 24);
    }

    #[test]
    fn test_success_requests_client_ready_on_signaling() {
        let mut m = machine();
        m.on_open().unwrap();

        let actions = m.on_message(inbound(json!({"msg_type": 4, "status_code": 0})));

        assert_eq!(actions, vec![MediaAction::SignalClientReady]);
        assert_eq!(m.state(), MediaState::ReadyAckSent);
    }

    #[test]
    fn test_nonzero_status_is_protocol_error() {
        let mut m = machine();
        m.on_open().unwrap();

        let actions = m.on_message(inbound(json!({"msg_type": 4, "status_code": 9})));

        assert_eq!(
            actions,
            vec![MediaAction::Fail(RelayError::Protocol {
                channel: ChannelRole::Media,
                status_code: 9
            })]
        );
        assert_eq!(m.state(), MediaState::Error);
    }

    #[test]
    fn test_transcript_delivered_after_handshake() {
        let mut m = machine();
        m.on_open().unwrap();
        m.on_message(inbound(json!({"msg_type": 4, "status_code": 0})));

        let actions = m.on_message(transcript("Alice", "hello"));

        assert_eq!(
            actions,
            vec![MediaAction::Deliver(TranscriptEvent {
                meeting_uuid: "abc".to_string(),
                user_id: Some("42".to_string()),
                user_name: "Alice".to_string(),
                text: "hello".to_string(),
                timestamp: Some(1000),
            })]
        );
        assert_eq!(m.state(), MediaState::Streaming);

        let more = m.on_message(transcript("Bob", "hi"));
        assert_eq!(more.len(), 1);
        assert_eq!(m.state(), MediaState::Streaming);
    }

    #[test]
    fn test_transcript_before_handshake_is_dropped() {
        let mut m = machine();
        m.on_open().unwrap();

        assert!(m.on_message(transcript("Alice", "too early")).is_empty());
        assert_eq!(m.state(), MediaState::AwaitingHandshakeAck);
    }

    #[test]
    fn test_keep_alive_echo() {
        let mut m = machine();
        m.on_open().unwrap();
        m.on_message(inbound(json!({"msg_type": 4, "status_code": 0})));

        let actions = m.on_message(inbound(json!({"msg_type": 12, "timestamp": 777})));

        assert_eq!(
            actions,
            vec![MediaAction::Send(Outbound::keep_alive_resp(Number::from(777u64)))]
        );
        assert_eq!(m.state(), MediaState::ReadyAckSent);
    }

    #[test]
    fn test_unknown_type_leaves_state_unchanged() {
        let mut m = machine();
        m.on_open().unwrap();
        m.on_message(inbound(json!({"msg_type": 4, "status_code": 0})));
        m.on_message(transcript("Alice", "hello"));

        assert!(m.on_message(inbound(json!({"msg_type": 14, "content": {}}))).is_empty());
        assert_eq!(m.state(), MediaState::Streaming);
    }

    #[test]
    fn test_closed_machine_is_inert() {
        let mut m = machine();
        m.on_open().unwrap();
        m.on_closed();

        assert_eq!(m.state(), MediaState::Closed);
        assert!(m
            .on_message(inbound(json!({"msg_type": 4, "status_code": 0})))
            .is_empty());
        assert!(m
            .on_message(inbound(json!({"msg_type": 12, "timestamp": 1})))
            .is_empty());
    }
}
