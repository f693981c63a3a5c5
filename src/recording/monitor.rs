use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{RecordingJob, RecordingStatus};
use crate::storage::ObjectStorage;
use crate::store::CallStore;
use crate::telephony::{EgressState, MediaPlatform};

#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Root directory for organized recordings (`base/{year}/{month}/{day}`).
    pub base_path: PathBuf,
    /// Poll interval for the platform job status.
    pub poll_interval: Duration,
    /// Consecutive poll errors tolerated before giving up on the job.
    pub max_poll_failures: u32,
    /// Object-storage key prefix for uploads.
    pub upload_prefix: String,
    /// TTL for presigned retrieval URLs.
    pub presign_ttl: Duration,
    /// Remove the local artifact after a verified upload.
    pub delete_local_after_upload: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("recordings"),
            poll_interval: Duration::from_secs(5),
            max_poll_failures: 5,
            upload_prefix: "call-recordings".to_string(),
            presign_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            delete_local_after_upload: true,
        }
    }
}

/// Drives one recording job: start request, status polling, file
/// organization and upload on completion.
///
/// Recording is a degraded-mode concern: every failure here is contained and
/// logged, and must never abort the call that owns this monitor.
pub struct RecordingMonitor {
    platform: Arc<dyn MediaPlatform>,
    store: Arc<dyn CallStore>,
    storage: Option<Arc<dyn ObjectStorage>>,
    config: RecordingConfig,
    job: Arc<Mutex<Option<RecordingJob>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RecordingMonitor {
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        store: Arc<dyn CallStore>,
        storage: Option<Arc<dyn ObjectStorage>>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            platform,
            store,
            storage,
            config,
            job: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Request a room recording and begin monitoring it.
    ///
    /// Returns the egress id on success, `None` on any failure; the call
    /// proceeds without a recording in that case.
    pub async fn start(&self, room: &str, call_id: &str) -> Option<String> {
        let egress_id = match self.platform.start_room_recording(room).await {
            Ok(id) => id,
            Err(e) => {
                error!(room, "failed to start recording: {e}");
                return None;
            }
        };
        info!(room, egress_id, "recording started");

        let job = RecordingJob::new(egress_id.clone(), room.to_string(), call_id.to_string());
        if let Err(e) = self.store.record_recording_started(&job).await {
            warn!(egress_id, "failed to persist recording start: {e}");
        }
        {
            let mut slot = self.job.lock().await;
            *slot = Some(job);
        }

        let task = tokio::spawn(monitor_loop(
            Arc::clone(&self.platform),
            Arc::clone(&self.store),
            self.storage.clone(),
            self.config.clone(),
            Arc::clone(&self.job),
            egress_id.clone(),
        ));
        {
            let mut handle = self.task.lock().await;
            *handle = Some(task);
        }

        Some(egress_id)
    }

    /// Current job state, if a recording was ever started.
    pub async fn job(&self) -> Option<RecordingJob> {
        self.job.lock().await.clone()
    }

    /// Best-effort stop: ask the platform to halt the job, then give the
    /// monitor loop a bounded grace period to observe the terminal status
    /// before aborting it. Never fails; the call is usually already tearing
    /// down when this runs.
    pub async fn shutdown(&self, grace: Duration) {
        let active = {
            let job = self.job.lock().await;
            job.as_ref()
                .filter(|j| !j.status.is_terminal())
                .map(|j| j.egress_id.clone())
        };
        if let Some(egress_id) = active {
            if let Err(e) = self.platform.stop_room_recording(&egress_id).await {
                warn!(egress_id, "failed to stop recording: {e}");
            }
        }

        let handle = {
            let mut task = self.task.lock().await;
            task.take()
        };
        if let Some(mut handle) = handle {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("recording monitor task panicked: {e}"),
                Err(_) => {
                    warn!("recording monitor did not finish within grace, aborting");
                    handle.abort();
                }
            }
        }
    }
}

async fn monitor_loop(
    platform: Arc<dyn MediaPlatform>,
    store: Arc<dyn CallStore>,
    storage: Option<Arc<dyn ObjectStorage>>,
    config: RecordingConfig,
    job: Arc<Mutex<Option<RecordingJob>>>,
    egress_id: String,
) {
    let mut consecutive_failures = 0u32;

    loop {
        tokio::time::sleep(config.poll_interval).await;

        let info = match platform.recording_status(&egress_id).await {
            Ok(info) => {
                consecutive_failures = 0;
                info
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    egress_id,
                    consecutive_failures, "failed to poll recording status: {e}"
                );
                if consecutive_failures >= config.max_poll_failures {
                    error!(egress_id, "giving up on recording after repeated poll failures");
                    finish_job(&store, &job, RecordingStatus::Failed).await;
                    return;
                }
                continue;
            }
        };

        let Some(info) = info else {
            // The platform no longer knows the job; never poll forever.
            warn!(egress_id, "recording job disappeared, marking failed");
            finish_job(&store, &job, RecordingStatus::Failed).await;
            return;
        };

        match info.status {
            EgressState::Starting | EgressState::Active => continue,
            EgressState::Failed => {
                error!(egress_id, "recording failed");
                finish_job(&store, &job, RecordingStatus::Failed).await;
                return;
            }
            EgressState::Complete => {
                info!(egress_id, "recording completed");
                complete_job(
                    &storage,
                    &store,
                    &config,
                    &job,
                    info.file_path.as_deref(),
                    info.duration_secs,
                )
                .await;
                return;
            }
        }
    }
}

/// Mark the job terminal and persist the final row. The full state change
/// happens under the job lock before the persistence write, so a cancelled
/// monitor can never leave a torn row behind.
async fn finish_job(
    store: &Arc<dyn CallStore>,
    job: &Arc<Mutex<Option<RecordingJob>>>,
    status: RecordingStatus,
) {
    let finished = {
        let mut slot = job.lock().await;
        match slot.as_mut() {
            Some(j) => j.finish(status).then(|| j.clone()),
            None => None,
        }
    };
    if let Some(j) = finished {
        if let Err(e) = store.record_recording_finished(&j).await {
            warn!(egress_id = j.egress_id, "failed to persist recording finish: {e}");
        }
    }
}

async fn complete_job(
    storage: &Option<Arc<dyn ObjectStorage>>,
    store: &Arc<dyn CallStore>,
    config: &RecordingConfig,
    job: &Arc<Mutex<Option<RecordingJob>>>,
    source: Option<&Path>,
    duration_secs: Option<f64>,
) {
    let call_id = {
        let slot = job.lock().await;
        match slot.as_ref() {
            Some(j) if !j.status.is_terminal() => j.call_id.clone(),
            _ => return,
        }
    };

    let final_path = match organize_file(&config.base_path, source, &call_id).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(call_id, "failed to organize recording file: {e}");
            source.map(Path::to_path_buf)
        }
    };

    let file_size = match &final_path {
        Some(p) => tokio::fs::metadata(p).await.ok().map(|m| m.len()),
        None => None,
    };

    // Upload is optional and fully contained: on failure the local artifact
    // is kept. The local file is only deleted after the upload has been
    // confirmed.
    let mut file_url = None;
    if let (Some(bucket), Some(local)) = (
        storage.as_ref(),
        final_path.as_ref().filter(|_| file_size.is_some()),
    ) {
        let key = object_key(&config.upload_prefix, &call_id);
        match bucket.upload(local, &key).await {
            Ok(()) => {
                file_url = match bucket.presigned_url(&key, config.presign_ttl).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(call_id, "failed to generate recording URL: {e}");
                        None
                    }
                };
                if config.delete_local_after_upload && file_url.is_some() {
                    if let Err(e) = tokio::fs::remove_file(local).await {
                        warn!(call_id, "failed to delete local recording after upload: {e}");
                    }
                }
            }
            Err(e) => {
                warn!(call_id, "recording upload failed, keeping local file: {e}");
            }
        }
    }

    let finished = {
        let mut slot = job.lock().await;
        match slot.as_mut() {
            Some(j) if !j.status.is_terminal() => {
                j.finish(RecordingStatus::Completed);
                j.file_path = final_path;
                j.file_url = file_url;
                j.file_size = file_size;
                j.duration_secs = duration_secs;
                Some(j.clone())
            }
            _ => None,
        }
    };
    if let Some(j) = finished {
        if let Err(e) = store.record_recording_finished(&j).await {
            warn!(egress_id = j.egress_id, "failed to persist recording finish: {e}");
        }
    }
}

/// Move the platform's output file into the deterministic date-keyed layout.
/// The filename is keyed by the call id, which is unique per call.
async fn organize_file(
    base: &Path,
    source: Option<&Path>,
    call_id: &str,
) -> anyhow::Result<PathBuf> {
    let now = Utc::now();
    let dir = base
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));
    tokio::fs::create_dir_all(&dir).await?;

    let dest = dir.join(format!("{call_id}.mp4"));
    if let Some(src) = source {
        if tokio::fs::try_exists(src).await.unwrap_or(false) {
            if tokio::fs::rename(src, &dest).await.is_err() {
                // Rename fails across filesystems; fall back to copy+remove.
                tokio::fs::copy(src, &dest).await?;
                if let Err(e) = tokio::fs::remove_file(src).await {
                    warn!("failed to remove recording source file: {e}");
                }
            }
            info!(dest = %dest.display(), "moved recording into place");
        }
    }
    Ok(dest)
}

fn object_key(prefix: &str, call_id: &str) -> String {
    let now = Utc::now();
    format!(
        "{prefix}/{}/{:02}/{:02}/{call_id}.mp4",
        now.year(),
        now.month(),
        now.day()
    )
}
