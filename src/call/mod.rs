//! Outbound call orchestration: per-call sessions, the live session
//! registry, and the JSON artifacts written when a call ends.

pub mod artifacts;
pub mod dial;
pub mod registry;
pub mod session;

pub use artifacts::{write_call_artifact, CallArtifact};
pub use dial::DialInfo;
pub use registry::CallRegistry;
pub use session::{CallSession, CallState, CallStatus, SessionContext, SessionLimits};
