pub mod audio;
pub mod call;
pub mod config;
pub mod disposition;
pub mod http;
pub mod recording;
pub mod storage;
pub mod store;
pub mod telephony;

pub use call::{CallRegistry, CallSession, CallState, CallStatus, DialInfo, SessionContext, SessionLimits};
pub use config::Config;
pub use disposition::{Disposition, DispositionSnapshot, DispositionTracker, RuleSet};
pub use http::{create_router, AppState};
pub use recording::{RecordingConfig, RecordingJob, RecordingMonitor, RecordingStatus};
pub use telephony::{MediaPlatform, NatsMediaPlatform, PlatformError, PlatformEvent};
