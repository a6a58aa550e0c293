//! Session management
//!
//! A session is one meeting's relay. The `SessionCoordinator` maps
//! lifecycle events to sessions:
//! - `meeting.rtms_started` creates a session and opens its signaling channel
//! - `meeting.rtms_stopped` closes both channels and drops the session
//! - sessions that fail or are closed remotely deregister themselves

mod coordinator;
mod events;
mod session;
mod state;

pub use coordinator::{SessionCoordinator, StartOutcome, StopOutcome};
pub use events::{LifecycleEvent, RTMS_STARTED, RTMS_STOPPED};
pub use session::Session;
pub use state::{SessionInfo, SessionState};
