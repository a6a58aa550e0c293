use crate::signature::Credentials;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub relay: RelaySettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ZoomConfig {
    pub client_id: String,
    /// Usually supplied through `RTMS__ZOOM__CLIENT_SECRET`
    #[serde(default)]
    pub client_secret: String,
}

/// Protocol timing knobs
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// How long a channel may wait for its handshake response
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// How long to wait for a close frame to go out on teardown
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_close_grace_ms() -> u64 {
    1000
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl RelaySettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

impl Config {
    /// Load from a config file, with `RTMS__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("RTMS").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Validated signing credentials
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::new(&self.zoom.client_id, &self.zoom.client_secret)
            .context("Zoom credentials are incomplete")
    }
}
