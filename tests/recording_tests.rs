// Integration tests for the recording lifecycle
//
// These verify the poll-organize-upload pipeline against the scripted
// platform: date-keyed organization, the upload/delete ordering, and the
// failure paths that must never hang the monitor.

mod common;

use chrono::{Datelike, Utc};
use common::MockPlatform;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use outdial::storage::ObjectStorage;
use outdial::store::{CallRecord, MemoryStore};
use outdial::telephony::{EgressInfo, EgressState};
use outdial::{RecordingConfig, RecordingMonitor, RecordingStatus};

fn fast_config(base: PathBuf) -> RecordingConfig {
    RecordingConfig {
        base_path: base,
        poll_interval: Duration::from_millis(10),
        max_poll_failures: 3,
        ..RecordingConfig::default()
    }
}

async fn wait_terminal(monitor: &RecordingMonitor) -> outdial::RecordingJob {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = monitor.job().await {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("recording job never reached a terminal state")
}

#[tokio::test]
async fn completed_recording_is_organized_uploaded_and_removed_locally() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("egress-out.mp4");
    std::fs::write(&source, b"fake mp4 payload").unwrap();

    let platform = Arc::new(MockPlatform::answering());
    platform
        .script_status(vec![
            Some(EgressInfo {
                status: EgressState::Active,
                file_path: None,
                duration_secs: None,
            }),
            Some(EgressInfo {
                status: EgressState::Complete,
                file_path: Some(source.clone()),
                duration_secs: Some(42.5),
            }),
        ])
        .await;

    let store = Arc::new(MemoryStore::new());
    let bucket_root = dir.path().join("bucket");
    let storage: Arc<dyn ObjectStorage> =
        Arc::new(outdial::storage::FsBucket::new(bucket_root.clone()));

    let monitor = RecordingMonitor::new(
        platform.clone(),
        store.clone(),
        Some(storage),
        fast_config(dir.path().join("recordings")),
    );
    let egress_id = monitor.start("room-1", "call-1").await;
    assert!(egress_id.is_some());

    let job = wait_terminal(&monitor).await;
    assert_eq!(job.status, RecordingStatus::Completed);
    assert_eq!(job.duration_secs, Some(42.5));
    assert_eq!(job.file_size, Some(16));

    // Organized under the date-keyed layout, named after the call.
    let now = Utc::now();
    let expected = dir
        .path()
        .join("recordings")
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()))
        .join("call-1.mp4");
    assert_eq!(job.file_path.as_deref(), Some(expected.as_path()));

    // Uploaded, URL minted, and only then was the local copy removed.
    let url = job.file_url.expect("upload should yield a URL");
    assert!(url.starts_with("file://"));
    assert!(!expected.exists(), "local file should be gone after upload");
    assert!(!source.exists(), "source file should have been moved");
    let uploaded: Vec<_> = walkdir(&bucket_root);
    assert_eq!(uploaded.len(), 1);
    assert!(uploaded[0].ends_with("call-1.mp4"));

    // Both lifecycle rows were persisted.
    let records = store.records().await;
    assert!(matches!(records[0], CallRecord::RecordingStarted { .. }));
    assert!(matches!(
        records.last(),
        Some(CallRecord::RecordingFinished { job, .. })
            if job.status == RecordingStatus::Completed
    ));
}

#[tokio::test]
async fn failed_upload_keeps_the_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("egress-out.mp4");
    std::fs::write(&source, b"fake mp4 payload").unwrap();

    let platform = Arc::new(MockPlatform::answering());
    platform
        .script_status(vec![Some(EgressInfo {
            status: EgressState::Complete,
            file_path: Some(source.clone()),
            duration_secs: Some(10.0),
        })])
        .await;
    let store = Arc::new(MemoryStore::new());
    let storage: Arc<dyn ObjectStorage> = Arc::new(common::RejectingBucket);
    let monitor = RecordingMonitor::new(
        platform,
        store,
        Some(storage),
        fast_config(dir.path().join("recordings")),
    );
    monitor.start("room-1", "call-9").await.unwrap();

    let job = wait_terminal(&monitor).await;
    assert_eq!(job.status, RecordingStatus::Completed);
    assert!(job.file_url.is_none(), "no URL without a verified upload");
    let local = job.file_path.expect("organized path should be recorded");
    assert!(
        local.exists(),
        "local file must survive when the upload fails"
    );
}

#[tokio::test]
async fn without_storage_the_local_file_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("egress-out.mp4");
    std::fs::write(&source, b"fake mp4 payload").unwrap();

    let platform = Arc::new(MockPlatform::answering());
    platform
        .script_status(vec![Some(EgressInfo {
            status: EgressState::Complete,
            file_path: Some(source.clone()),
            duration_secs: Some(10.0),
        })])
        .await;
    let store = Arc::new(MemoryStore::new());
    let monitor = RecordingMonitor::new(
        platform,
        store,
        None,
        fast_config(dir.path().join("recordings")),
    );
    monitor.start("room-1", "call-2").await.unwrap();

    let job = wait_terminal(&monitor).await;
    assert_eq!(job.status, RecordingStatus::Completed);
    assert!(job.file_url.is_none());
    let local = job.file_path.expect("organized path should be recorded");
    assert!(local.exists(), "local file must survive when there is no bucket");
}

#[tokio::test]
async fn disappeared_job_is_marked_failed() {
    let dir = tempfile::tempdir().unwrap();
    let platform = Arc::new(MockPlatform::answering());
    // Empty script: the first poll already finds the job gone.
    let store = Arc::new(MemoryStore::new());
    let monitor = RecordingMonitor::new(
        platform,
        store.clone(),
        None,
        fast_config(dir.path().join("recordings")),
    );
    monitor.start("room-1", "call-3").await.unwrap();

    let job = wait_terminal(&monitor).await;
    assert_eq!(job.status, RecordingStatus::Failed);

    let records = store.records().await;
    assert!(matches!(
        records.last(),
        Some(CallRecord::RecordingFinished { job, .. })
            if job.status == RecordingStatus::Failed
    ));
}

#[tokio::test]
async fn failed_start_leaves_no_job() {
    let dir = tempfile::tempdir().unwrap();
    let platform = Arc::new(MockPlatform::answering());
    platform.fail_recording_start.store(true, Ordering::SeqCst);
    let monitor = RecordingMonitor::new(
        platform,
        Arc::new(MemoryStore::new()),
        None,
        fast_config(dir.path().join("recordings")),
    );

    assert!(monitor.start("room-1", "call-4").await.is_none());
    assert!(monitor.job().await.is_none());
}

#[tokio::test]
async fn shutdown_stops_an_active_recording() {
    let dir = tempfile::tempdir().unwrap();
    let platform = Arc::new(MockPlatform::answering());
    // Stay Active long enough for shutdown to observe a live job.
    platform
        .script_status(vec![
            Some(EgressInfo {
                status: EgressState::Active,
                file_path: None,
                duration_secs: None,
            });
            50
        ])
        .await;
    let monitor = RecordingMonitor::new(
        platform.clone(),
        Arc::new(MemoryStore::new()),
        None,
        fast_config(dir.path().join("recordings")),
    );
    let egress_id = monitor.start("room-1", "call-5").await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    monitor.shutdown(Duration::from_millis(100)).await;

    let stopped = platform.stopped_recordings.lock().await;
    assert_eq!(stopped.as_slice(), [egress_id]);
}

fn walkdir(root: &std::path::Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}
