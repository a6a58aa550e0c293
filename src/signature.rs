//! Handshake signatures
//!
//! Every handshake request carries
//! `hex(HMAC-SHA256(client_secret, "{client_id},{meeting_uuid},{stream_id}"))`.

use crate::error::{RelayError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// App credentials used to sign handshakes
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Validate and bundle credentials. An empty secret is rejected.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_secret.is_empty() {
            return Err(RelayError::Configuration(
                "client secret is missing".to_string(),
            ));
        }

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sign a handshake for one meeting stream
    pub fn sign(&self, meeting_uuid: &str, stream_id: &str) -> Result<String> {
        sign(&self.client_id, &self.client_secret, meeting_uuid, stream_id)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

pub fn sign(
    client_id: &str,
    client_secret: &str,
    meeting_uuid: &str,
    stream_id: &str,
) -> Result<String> {
    if client_secret.is_empty() {
        return Err(RelayError::Configuration(
            "client secret is missing".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| RelayError::Configuration(format!("invalid client secret: {}", e)))?;
    mac.update(format!("{},{},{}", client_id, meeting_uuid, stream_id).as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
