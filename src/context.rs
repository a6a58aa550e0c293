use crate::config::RelaySettings;
use crate::signature::Credentials;
use crate::sink::TranscriptSink;
use crate::transport::Connector;
use std::sync::Arc;

/// Everything a session's channels need from the outside world
#[derive(Clone)]
pub struct RelayContext {
    pub credentials: Credentials,
    pub connector: Arc<dyn Connector>,
    pub sink: Arc<dyn TranscriptSink>,
    pub settings: RelaySettings,
}

impl RelayContext {
    pub fn new(
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn TranscriptSink>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            credentials,
            connector,
            sink,
            settings,
        }
    }
}
