use std::fmt;
use thiserror::Error;

/// Which of a session's two connections an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Signaling,
    Media,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Signaling => write!(f, "signaling"),
            ChannelRole::Media => write!(f, "media"),
        }
    }
}

/// Errors raised by the relay protocol engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Missing or invalid credentials; fatal before any connection attempt
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote rejected a handshake with a nonzero status code
    #[error("{channel} handshake rejected with status code {status_code}")]
    Protocol { channel: ChannelRole, status_code: i64 },

    /// Signaling handshake succeeded but carried no transcript endpoint
    #[error("signaling handshake response has no media server URL")]
    MissingMediaUrl,

    /// Socket error or unexpected close
    #[error("{channel} transport error: {reason}")]
    Transport { channel: ChannelRole, reason: String },

    /// No handshake response arrived within the configured window
    #[error("{channel} handshake timed out")]
    HandshakeTimeout { channel: ChannelRole },

    /// Undecodable inbound frame
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl RelayError {
    pub fn transport(channel: ChannelRole, reason: impl fmt::Display) -> Self {
        RelayError::Transport {
            channel,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
