//! Persistence gateway for call lifecycle records.
//!
//! Writes here are best-effort telemetry: the call's behavior never depends
//! on them, so every caller logs failures and moves on. The engine only knows
//! this small update contract; schema and storage mechanics live elsewhere.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::disposition::{Disposition, DispositionSnapshot};
use crate::recording::RecordingJob;

/// One persisted lifecycle record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallRecord {
    CallStarted {
        call_id: String,
        room: String,
        phone: String,
        at: DateTime<Utc>,
    },
    CallConnected {
        call_id: String,
        at: DateTime<Utc>,
    },
    CallCompleted {
        call_id: String,
        snapshot: DispositionSnapshot,
        recording_url: Option<String>,
        at: DateTime<Utc>,
    },
    CallFailed {
        call_id: String,
        disposition: Disposition,
        raw_status: String,
        at: DateTime<Utc>,
    },
    RecordingStarted {
        job: RecordingJob,
        at: DateTime<Utc>,
    },
    RecordingFinished {
        job: RecordingJob,
        at: DateTime<Utc>,
    },
}

/// Lifecycle update contract consumed by the engine.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn record_call_started(&self, call_id: &str, room: &str, phone: &str) -> Result<()>;

    async fn record_call_connected(&self, call_id: &str) -> Result<()>;

    async fn record_call_completed(
        &self,
        call_id: &str,
        snapshot: &DispositionSnapshot,
        recording_url: Option<&str>,
    ) -> Result<()>;

    async fn record_call_failed(
        &self,
        call_id: &str,
        disposition: Disposition,
        raw_status: &str,
    ) -> Result<()>;

    async fn record_recording_started(&self, job: &RecordingJob) -> Result<()>;

    async fn record_recording_finished(&self, job: &RecordingJob) -> Result<()>;
}

/// Append-only JSON lines store, one record per line.
pub struct JsonlStore {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonlStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open store file {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn append(&self, record: &CallRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("failed to serialize call record")?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .context("failed to append call record")?;
        file.flush().await.context("failed to flush call record")?;
        Ok(())
    }
}

#[async_trait]
impl CallStore for JsonlStore {
    async fn record_call_started(&self, call_id: &str, room: &str, phone: &str) -> Result<()> {
        self.append(&CallRecord::CallStarted {
            call_id: call_id.to_string(),
            room: room.to_string(),
            phone: phone.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_connected(&self, call_id: &str) -> Result<()> {
        self.append(&CallRecord::CallConnected {
            call_id: call_id.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_completed(
        &self,
        call_id: &str,
        snapshot: &DispositionSnapshot,
        recording_url: Option<&str>,
    ) -> Result<()> {
        self.append(&CallRecord::CallCompleted {
            call_id: call_id.to_string(),
            snapshot: snapshot.clone(),
            recording_url: recording_url.map(str::to_string),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_failed(
        &self,
        call_id: &str,
        disposition: Disposition,
        raw_status: &str,
    ) -> Result<()> {
        self.append(&CallRecord::CallFailed {
            call_id: call_id.to_string(),
            disposition,
            raw_status: raw_status.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_recording_started(&self, job: &RecordingJob) -> Result<()> {
        self.append(&CallRecord::RecordingStarted {
            job: job.clone(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_recording_finished(&self, job: &RecordingJob) -> Result<()> {
        self.append(&CallRecord::RecordingFinished {
            job: job.clone(),
            at: Utc::now(),
        })
        .await
    }
}

/// In-memory store for tests: records every write in order.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CallRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CallRecord> {
        self.records.lock().await.clone()
    }

    async fn push(&self, record: CallRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn record_call_started(&self, call_id: &str, room: &str, phone: &str) -> Result<()> {
        self.push(CallRecord::CallStarted {
            call_id: call_id.to_string(),
            room: room.to_string(),
            phone: phone.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_connected(&self, call_id: &str) -> Result<()> {
        self.push(CallRecord::CallConnected {
            call_id: call_id.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_completed(
        &self,
        call_id: &str,
        snapshot: &DispositionSnapshot,
        recording_url: Option<&str>,
    ) -> Result<()> {
        self.push(CallRecord::CallCompleted {
            call_id: call_id.to_string(),
            snapshot: snapshot.clone(),
            recording_url: recording_url.map(str::to_string),
            at: Utc::now(),
        })
        .await
    }

    async fn record_call_failed(
        &self,
        call_id: &str,
        disposition: Disposition,
        raw_status: &str,
    ) -> Result<()> {
        self.push(CallRecord::CallFailed {
            call_id: call_id.to_string(),
            disposition,
            raw_status: raw_status.to_string(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_recording_started(&self, job: &RecordingJob) -> Result<()> {
        self.push(CallRecord::RecordingStarted {
            job: job.clone(),
            at: Utc::now(),
        })
        .await
    }

    async fn record_recording_finished(&self, job: &RecordingJob) -> Result<()> {
        self.push(CallRecord::RecordingFinished {
            job: job.clone(),
            at: Utc::now(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposition::ConnectionStatus;

    #[tokio::test]
    async fn jsonl_store_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.jsonl");
        let store = JsonlStore::open(&path).await.unwrap();

        store
            .record_call_started("call-1", "room-1", "+15551234")
            .await
            .unwrap();
        let snapshot = DispositionSnapshot {
            disposition: Some(Disposition::NoResponse),
            connection_status: Some(ConnectionStatus::Connected),
            history: vec![],
            transcript: vec![],
            call_duration_secs: 12.0,
        };
        store
            .record_call_completed("call-1", &snapshot, None)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("call_started"));
        assert!(lines[1].contains("call_completed"));
    }
}
