//! WebSocket transport for the signaling and media channels
//!
//! A `Connector` dials a URL and hands back a `Connection`: a sink for
//! outbound text frames and a receiver of inbound `TransportEvent`s fed by a
//! background read pump.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// An event produced by the read side of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived
    Text(String),
    /// The remote closed the connection (with its close reason, if any)
    Closed(Option<String>),
    /// The socket failed
    Error(String),
}

/// Write half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Send a close frame and shut the write half down
    async fn close(&mut self);
}

/// An open connection
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens connections to endpoint URLs
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const EVENT_BUFFER: usize = 64;

/// `Connector` backed by tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        debug!("Dialing {}", url);

        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("WebSocket connect to {} failed", url))?;

        let (sink, stream) = ws.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(read_pump(stream, event_tx));

        Ok(Connection {
            sink: Box::new(WsFrameSink { sink: Some(sink) }),
            events: event_rx,
        })
    }
}

struct WsFrameSink {
    sink: Option<WsSink>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let sink = self.sink.as_mut().ok_or_else(|| anyhow!("Socket is closed"))?;
        sink.send(Message::text(text))
            .await
            .map_err(|e| anyhow!("WebSocket send error: {}", e))
    }

    async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("Close frame not sent: {}", e);
            }
            let _ = sink.close().await;
        }
    }
}

async fn read_pump(mut stream: WsStream, event_tx: mpsc::Sender<TransportEvent>) {
    loop {
        let next = tokio::select! {
            // Owner dropped the connection
            _ = event_tx.closed() => break,
            next = stream.next() => next,
        };

        let event = match next {
            Some(Ok(Message::Text(text))) => TransportEvent::Text(text.as_str().to_owned()),
            Some(Ok(Message::Close(frame))) => {
                TransportEvent::Closed(frame.map(|f| f.reason.as_str().to_owned()))
            }
            Some(Ok(Message::Binary(data))) => {
                warn!("Ignoring {} byte binary frame", data.len());
                continue;
            }
            // Pings are answered by tungstenite
            Some(Ok(_)) => continue,
            Some(Err(e)) => TransportEvent::Error(e.to_string()),
            None => TransportEvent::Closed(None),
        };

        let terminal = !matches!(event, TransportEvent::Text(_));
        if event_tx.send(event).await.is_err() || terminal {
            break;
        }
    }

    debug!("Read pump stopped");
}
