use super::media_types::MediaTypes;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

pub const SIGNALING_HANDSHAKE_REQ: u32 = 1;
pub const SIGNALING_HANDSHAKE_RESP: u32 = 2;
pub const DATA_HANDSHAKE_REQ: u32 = 3;
pub const DATA_HANDSHAKE_RESP: u32 = 4;
pub const CLIENT_READY_ACK: u32 = 7;
pub const KEEP_ALIVE_REQ: u32 = 12;
pub const KEEP_ALIVE_RESP: u32 = 13;
pub const MEDIA_DATA_TRANSCRIPT: u32 = 17;

pub const PROTOCOL_VERSION: u32 = 1;

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalingHandshakeReq {
    pub msg_type: u32,
    pub meeting_uuid: String,
    pub rtms_stream_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHandshakeReq {
    pub msg_type: u32,
    pub protocol_version: u32,
    pub sequence: u64,
    pub meeting_uuid: String,
    pub rtms_stream_id: String,
    pub signature: String,
    pub media_type: MediaTypes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientReadyAck {
    pub msg_type: u32,
    pub rtms_stream_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepAlive {
    pub msg_type: u32,
    /// Echoed verbatim, so kept as the JSON number that arrived
    pub timestamp: Number,
}

/// Messages this client writes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    SignalingHandshake(SignalingHandshakeReq),
    DataHandshake(DataHandshakeReq),
    ClientReadyAck(ClientReadyAck),
    KeepAliveResp(KeepAlive),
}

impl Outbound {
    pub fn signaling_handshake(meeting_uuid: &str, stream_id: &str, signature: String) -> Self {
        Outbound::SignalingHandshake(SignalingHandshakeReq {
            msg_type: SIGNALING_HANDSHAKE_REQ,
            meeting_uuid: meeting_uuid.to_string(),
            rtms_stream_id: stream_id.to_string(),
            signature,
        })
    }

    pub fn data_handshake(
        meeting_uuid: &str,
        stream_id: &str,
        signature: String,
        media_type: MediaTypes,
    ) -> Self {
        Outbound::DataHandshake(DataHandshakeReq {
            msg_type: DATA_HANDSHAKE_REQ,
            protocol_version: PROTOCOL_VERSION,
            sequence: 0,
            meeting_uuid: meeting_uuid.to_string(),
            rtms_stream_id: stream_id.to_string(),
            signature,
            media_type,
        })
    }

    pub fn client_ready_ack(stream_id: &str) -> Self {
        Outbound::ClientReadyAck(ClientReadyAck {
            msg_type: CLIENT_READY_ACK,
            rtms_stream_id: stream_id.to_string(),
        })
    }

    pub fn keep_alive_resp(timestamp: Number) -> Self {
        Outbound::KeepAliveResp(KeepAlive {
            msg_type: KEEP_ALIVE_RESP,
            timestamp,
        })
    }

    pub fn msg_type(&self) -> u32 {
        match self {
            Outbound::SignalingHandshake(m) => m.msg_type,
            Outbound::DataHandshake(m) => m.msg_type,
            Outbound::ClientReadyAck(m) => m.msg_type,
            Outbound::KeepAliveResp(m) => m.msg_type,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RelayError::Malformed(e.to_string()))
    }
}

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalingHandshakeResp {
    pub status_code: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub media_server: Option<MediaServer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaServer {
    #[serde(default)]
    pub server_urls: ServerUrls,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServerUrls {
    pub transcript: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub all: Option<String>,
}

impl SignalingHandshakeResp {
    /// Endpoint that serves transcript data
    pub fn media_url(&self) -> Option<&str> {
        let urls = &self.media_server.as_ref()?.server_urls;
        urls.transcript
            .as_deref()
            .or(urls.all.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataHandshakeResp {
    pub status_code: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeepAliveReq {
    pub timestamp: Number,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptData {
    pub content: TranscriptContent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptContent {
    /// Speaker id; the service sends it as a number or a string
    #[serde(default, deserialize_with = "user_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    pub data: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserId {
    Text(String),
    Number(Number),
}

fn user_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<UserId>::deserialize(deserializer)?.map(|id| match id {
        UserId::Text(text) => text,
        UserId::Number(number) => number.to_string(),
    }))
}

/// Messages this client reads
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    SignalingHandshakeResp(SignalingHandshakeResp),
    DataHandshakeResp(DataHandshakeResp),
    KeepAliveReq(KeepAliveReq),
    Transcript(TranscriptData),
    /// Well-formed frame with a msg_type this client does not handle
    Unknown(u32),
}

#[derive(Deserialize)]
struct Envelope {
    msg_type: u32,
}

impl Inbound {
    /// Decode a text frame. Unrecognized types are `Unknown`, not errors.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RelayError::Malformed(e.to_string()))?;
        let envelope = Envelope::deserialize(&value)
            .map_err(|e| RelayError::Malformed(format!("missing msg_type: {}", e)))?;

        let inbound = match envelope.msg_type {
            SIGNALING_HANDSHAKE_RESP => Inbound::SignalingHandshakeResp(parse(value)?),
            DATA_HANDSHAKE_RESP => Inbound::DataHandshakeResp(parse(value)?),
            KEEP_ALIVE_REQ => Inbound::KeepAliveReq(parse(value)?),
            MEDIA_DATA_TRANSCRIPT => Inbound::Transcript(parse(value)?),
            other => Inbound::Unknown(other),
        };

        Ok(inbound)
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RelayError::Malformed(e.to_string()))
}
