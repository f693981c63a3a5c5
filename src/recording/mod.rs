//! Recording lifecycle: the job model and the monitor that drives one
//! platform egress job from start through upload and file organization.

mod monitor;

pub use monitor::{RecordingConfig, RecordingMonitor};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Recording job state. Transitions are monotonic: `Recording` may move to
/// either terminal state, and terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Recording,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordingStatus::Completed | RecordingStatus::Failed)
    }
}

/// One platform recording job and its local bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingJob {
    pub egress_id: String,
    pub room: String,
    pub call_id: String,
    pub status: RecordingStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last-known local path of the organized file.
    pub file_path: Option<PathBuf>,
    /// Object-storage URL, set only after a verified upload.
    pub file_url: Option<String>,
    pub file_size: Option<u64>,
    pub duration_secs: Option<f64>,
}

impl RecordingJob {
    pub fn new(egress_id: String, room: String, call_id: String) -> Self {
        Self {
            egress_id,
            room,
            call_id,
            status: RecordingStatus::Recording,
            started_at: Utc::now(),
            completed_at: None,
            file_path: None,
            file_url: None,
            file_size: None,
            duration_secs: None,
        }
    }

    /// Move the job to a terminal status. Returns false (and changes nothing)
    /// if the job is already terminal.
    pub fn finish(&mut self, status: RecordingStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        let mut job = RecordingJob::new("eg-1".into(), "room-1".into(), "call-1".into());
        assert_eq!(job.status, RecordingStatus::Recording);

        assert!(job.finish(RecordingStatus::Completed));
        let completed_at = job.completed_at;

        // A later failure report must not move the job out of Completed.
        assert!(!job.finish(RecordingStatus::Failed));
        assert_eq!(job.status, RecordingStatus::Completed);
        assert_eq!(job.completed_at, completed_at);
    }

    #[test]
    fn failed_is_also_final() {
        let mut job = RecordingJob::new("eg-2".into(), "room-1".into(), "call-1".into());
        assert!(job.finish(RecordingStatus::Failed));
        assert!(!job.finish(RecordingStatus::Completed));
        assert_eq!(job.status, RecordingStatus::Failed);
    }
}
