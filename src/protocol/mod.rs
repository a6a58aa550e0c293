//! RTMS wire protocol
//!
//! JSON text frames discriminated by an integer `msg_type`:
//! - 1/2: signaling handshake request/response
//! - 3/4: data (media) handshake request/response
//! - 7: client ready acknowledgment (signaling channel only)
//! - 12/13: keep-alive request/response
//! - 17: transcript data

mod media_types;
pub mod messages;

pub use media_types::MediaTypes;
pub use messages::{Inbound, Outbound, TranscriptContent};
