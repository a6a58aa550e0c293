use super::{close_sink, media, send_frame, until_cancelled, SignalingCommand, StreamInfo};
use crate::context::RelayContext;
use crate::error::{ChannelRole, RelayError, Result};
use crate::protocol::{Inbound, Outbound};
use crate::session::SessionState;
use crate::signature::Credentials;
use crate::transport::{Connection, TransportEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

const ROLE: ChannelRole = ChannelRole::Signaling;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Connecting,
    AwaitingHandshakeAck,
    Ready,
    Closed,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalingAction {
    /// Write a message on the signaling connection
    Send(Outbound),
    /// Open the media channel against this URL
    StartMedia(String),
    /// Terminal failure; tear the session down
    Fail(RelayError),
}

/// Authenticates a stream and discovers its media endpoint
pub struct SignalingMachine {
    stream: StreamInfo,
    credentials: Credentials,
    state: SignalingState,
}

impl SignalingMachine {
    pub fn new(stream: StreamInfo, credentials: Credentials) -> Self {
        Self {
            stream,
            credentials,
            state: SignalingState::Connecting,
        }
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SignalingState::Closed | SignalingState::Error)
    }

    pub fn awaiting_ack(&self) -> bool {
        self.state == SignalingState::AwaitingHandshakeAck
    }

    /// Handshake request; must be the first frame on a new connection
    pub fn on_open(&mut self) -> Result<Outbound> {
        let signature = self
            .credentials
            .sign(&self.stream.meeting_uuid, &self.stream.stream_id)
            .map_err(|e| self.fail(e))?;

        self.state = SignalingState::AwaitingHandshakeAck;
        Ok(Outbound::signaling_handshake(
            &self.stream.meeting_uuid,
            &self.stream.stream_id,
            signature,
        ))
    }

    pub fn on_message(&mut self, message: Inbound) -> Vec<SignalingAction> {
        if self.is_terminal() {
            return Vec::new();
        }

        match message {
            Inbound::KeepAliveReq(req) => {
                debug!("KEEP_ALIVE_REQ on signaling, echoing {}", req.timestamp);
                vec![SignalingAction::Send(Outbound::keep_alive_resp(req.timestamp))]
            }
            Inbound::SignalingHandshakeResp(resp) if self.awaiting_ack() => {
                if resp.status_code != 0 {
                    warn!(
                        "Signaling handshake rejected: status={} reason={:?}",
                        resp.status_code, resp.reason
                    );
                    let err = self.fail(RelayError::Protocol {
                        channel: ROLE,
                        status_code: resp.status_code,
                    });
                    return vec![SignalingAction::Fail(err)];
                }

                match resp.media_url() {
                    Some(url) => {
                        self.state = SignalingState::Ready;
                        vec![SignalingAction::StartMedia(url.to_string())]
                    }
                    None => vec![SignalingAction::Fail(self.fail(RelayError::MissingMediaUrl))],
                }
            }
            Inbound::SignalingHandshakeResp(_) => {
                warn!("Ignoring signaling handshake response in state {:?}", self.state);
                Vec::new()
            }
            Inbound::Unknown(msg_type) => {
                debug!("Ignoring signaling msg_type={}", msg_type);
                Vec::new()
            }
            other => {
                debug!("Ignoring unexpected message on signaling: {:?}", other);
                Vec::new()
            }
        }
    }

    /// CLIENT_READY_ACK, once the handshake has succeeded
    pub fn client_ready(&mut self) -> Option<Outbound> {
        if self.state != SignalingState::Ready {
            warn!("Client ready requested in state {:?}; not sending ack", self.state);
            return None;
        }
        Some(Outbound::client_ready_ack(&self.stream.stream_id))
    }

    pub fn on_closed(&mut self) {
        if !self.is_terminal() {
            self.state = SignalingState::Closed;
        }
    }

    pub fn fail(&mut self, err: RelayError) -> RelayError {
        self.state = SignalingState::Error;
        err
    }
}

/// Drive one session's signaling channel until stop, failure or close.
///
/// Spawns the media channel on handshake success and does not return until
/// that channel has finished too.
pub(crate) async fn run(
    ctx: Arc<RelayContext>,
    stream: StreamInfo,
    endpoint: String,
    cancel: CancellationToken,
    state_tx: watch::Sender<SessionState>,
) -> Result<()> {
    let mut machine = SignalingMachine::new(stream.clone(), ctx.credentials.clone());

    info!("Connecting signaling channel to {}", endpoint);
    let Connection {
        mut sink,
        mut events,
    } = tokio::select! {
        _ = cancel.cancelled() => {
            machine.on_closed();
            return Ok(());
        }
        conn = ctx.connector.connect(&endpoint) => {
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
    info!("Signaling handshake sent");
    state_tx.send_replace(SessionState::Signaling);

    let (command_tx, mut commands) = mpsc::channel(8);
    let mut media_task: Option<JoinHandle<Result<()>>> = None;
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
            Some(command) = commands.recv() => match command {
                SignalingCommand::ClientReady => {
                    if let Some(ack) = machine.client_ready() {
                        match until_cancelled(&cancel, send_frame(&mut sink, ROLE, &ack)).await {
                            Some(Ok(())) => info!("CLIENT_READY_ACK sent"),
                            Some(Err(e)) => break Err(machine.fail(e)),
                            None => {
                                machine.on_closed();
                                break Ok(());
                            }
                        }
                    }
                }
            },
            result = join_media(&mut media_task), if media_task.is_some() => {
                media_task = None;
                machine.on_closed();
                break result;
            }
            event = events.recv() => match event {
                Some(TransportEvent::Text(text)) => {
                    let message = match Inbound::decode(&text) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Ignoring signaling frame: {}", e);
                            continue;
                        }
                    };

                    let mut exit = None;
                    for action in machine.on_message(message) {
                        match action {
                            SignalingAction::Send(reply) => {
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
                            SignalingAction::StartMedia(url) => {
                                info!("Signaling handshake succeeded; media endpoint {}", url);
                                state_tx.send_replace(SessionState::Negotiating);
                                let span =
                                    info_span!("media", meeting_uuid = %stream.meeting_uuid);
                                media_task = Some(tokio::spawn(
                                    media::run(
                                        Arc::clone(&ctx),
                                        stream.clone(),
                                        url,
                                        cancel.child_token(),
                                        command_tx.clone(),
                                        state_tx.clone(),
                                    )
                                    .instrument(span),
                                ));
                            }
                            SignalingAction::Fail(e) => {
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
        error!("Signaling channel ended: {}", e);
    }

    // The media channel never outlives signaling
    cancel.cancel();
    close_sink(&mut sink, ctx.settings.close_grace()).await;
    let media_outcome = match media_task.take() {
        Some(task) => flatten(task.await),
        None => Ok(()),
    };

    info!("Signaling channel closed ({:?})", machine.state());
    outcome.and(media_outcome)
}

async fn join_media(task: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    match task {
        Some(handle) => flatten(handle.await),
        None => std::future::pending().await,
    }
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.unwrap_or_else(|e| {
        Err(RelayError::transport(
            ChannelRole::Media,
            format!("media task aborted: {}", e),
        ))
    })
}
