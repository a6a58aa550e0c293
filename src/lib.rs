pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod protocol;
pub mod session;
pub mod signature;
pub mod sink;
pub mod transport;

pub use channel::{MediaMachine, MediaState, SignalingMachine, SignalingState, StreamInfo};
pub use config::{Config, RelaySettings};
pub use context::RelayContext;
pub use error::{ChannelRole, RelayError};
pub use http::{create_router, AppState};
pub use protocol::{Inbound, MediaTypes, Outbound};
pub use session::{
    LifecycleEvent, SessionCoordinator, SessionInfo, SessionState, StartOutcome, StopOutcome,
};
pub use signature::{sign, Credentials};
pub use sink::{ChannelSink, LogSink, TranscriptEvent, TranscriptSink};
pub use transport::{Connection, Connector, FrameSink, TransportEvent, WsConnector};
