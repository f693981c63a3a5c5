// Shared test doubles: a scripted telephony platform standing in for the
// real NATS-backed one.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use outdial::audio::AudioFrame;
use outdial::call::{SessionContext, SessionLimits};
use outdial::config::ArtifactsConfig;
use outdial::storage::ObjectStorage;
use outdial::store::MemoryStore;
use outdial::telephony::{
    DialRequest, EgressInfo, MediaPlatform, ParticipantInfo, PlatformError, PlatformEvent,
};
use outdial::{RecordingConfig, RuleSet};

/// Scripted platform: tests configure the dial outcome and the recording
/// status replies, and inspect the commands the engine issued.
pub struct MockPlatform {
    /// `Ok(identity)` answers the dial, `Err(sip_status)` fails it.
    pub dial_result: Mutex<Result<String, String>>,
    pub dials: Mutex<Vec<DialRequest>>,
    pub created_rooms: Mutex<Vec<String>>,
    pub deleted_rooms: Mutex<Vec<String>>,
    pub transfer_ok: AtomicBool,
    pub transfers: Mutex<Vec<(String, String, String)>>,
    pub said: Mutex<Vec<String>>,
    pub fail_recording_start: AtomicBool,
    pub started_recordings: Mutex<Vec<String>>,
    pub stopped_recordings: Mutex<Vec<String>>,
    /// One entry per `recording_status` poll; exhausted script means the
    /// platform no longer knows the job.
    pub status_script: Mutex<VecDeque<Option<EgressInfo>>>,
    events_rx: Mutex<Option<mpsc::Receiver<PlatformEvent>>>,
    audio_rx: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

impl MockPlatform {
    pub fn answering() -> Self {
        Self {
            dial_result: Mutex::new(Ok("sip-callee".to_string())),
            dials: Mutex::new(Vec::new()),
            created_rooms: Mutex::new(Vec::new()),
            deleted_rooms: Mutex::new(Vec::new()),
            transfer_ok: AtomicBool::new(true),
            transfers: Mutex::new(Vec::new()),
            said: Mutex::new(Vec::new()),
            fail_recording_start: AtomicBool::new(false),
            started_recordings: Mutex::new(Vec::new()),
            stopped_recordings: Mutex::new(Vec::new()),
            status_script: Mutex::new(VecDeque::new()),
            events_rx: Mutex::new(None),
            audio_rx: Mutex::new(None),
        }
    }

    pub async fn with_dial_failure(sip_status: &str) -> Self {
        let platform = Self::answering();
        *platform.dial_result.lock().await = Err(sip_status.to_string());
        platform
    }

    /// Create the event channel handed out by `subscribe_events`. Must be
    /// called before the session launches.
    pub async fn script_events(&self) -> mpsc::Sender<PlatformEvent> {
        let (tx, rx) = mpsc::channel(64);
        *self.events_rx.lock().await = Some(rx);
        tx
    }

    pub async fn script_audio(&self) -> mpsc::Sender<AudioFrame> {
        let (tx, rx) = mpsc::channel(64);
        *self.audio_rx.lock().await = Some(rx);
        tx
    }

    pub async fn script_status(&self, replies: Vec<Option<EgressInfo>>) {
        *self.status_script.lock().await = replies.into();
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    async fn create_room(&self, room: &str) -> Result<(), PlatformError> {
        self.created_rooms.lock().await.push(room.to_string());
        Ok(())
    }

    async fn delete_room(&self, room: &str) -> Result<(), PlatformError> {
        self.deleted_rooms.lock().await.push(room.to_string());
        Ok(())
    }

    async fn dial(&self, request: DialRequest) -> Result<ParticipantInfo, PlatformError> {
        self.dials.lock().await.push(request);
        match &*self.dial_result.lock().await {
            Ok(identity) => Ok(ParticipantInfo {
                identity: identity.clone(),
            }),
            Err(sip_status) => Err(PlatformError::Dial {
                sip_status: sip_status.clone(),
            }),
        }
    }

    async fn transfer(
        &self,
        room: &str,
        participant: &str,
        transfer_to: &str,
    ) -> Result<(), PlatformError> {
        self.transfers.lock().await.push((
            room.to_string(),
            participant.to_string(),
            transfer_to.to_string(),
        ));
        if self.transfer_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PlatformError::Rejected("transfer refused".to_string()))
        }
    }

    async fn say(&self, _room: &str, text: &str) -> Result<(), PlatformError> {
        self.said.lock().await.push(text.to_string());
        Ok(())
    }

    async fn start_room_recording(&self, room: &str) -> Result<String, PlatformError> {
        if self.fail_recording_start.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("egress unavailable".to_string()));
        }
        self.started_recordings.lock().await.push(room.to_string());
        Ok(format!("egress-{}", self.started_recordings.lock().await.len()))
    }

    async fn stop_room_recording(&self, egress_id: &str) -> Result<(), PlatformError> {
        self.stopped_recordings
            .lock()
            .await
            .push(egress_id.to_string());
        Ok(())
    }

    async fn recording_status(
        &self,
        _egress_id: &str,
    ) -> Result<Option<EgressInfo>, PlatformError> {
        Ok(self.status_script.lock().await.pop_front().flatten())
    }

    async fn subscribe_events(
        &self,
        _room: &str,
    ) -> Result<mpsc::Receiver<PlatformEvent>, PlatformError> {
        match self.events_rx.lock().await.take() {
            Some(rx) => Ok(rx),
            None => {
                // Unscripted: hand out a channel that closes immediately.
                let (_tx, rx) = mpsc::channel(1);
                Ok(rx)
            }
        }
    }

    async fn subscribe_audio(
        &self,
        _room: &str,
    ) -> Result<mpsc::Receiver<AudioFrame>, PlatformError> {
        match self.audio_rx.lock().await.take() {
            Some(rx) => Ok(rx),
            None => {
                let (_tx, rx) = mpsc::channel(1);
                Ok(rx)
            }
        }
    }
}

/// Storage double whose uploads always fail, for exercising the
/// keep-local-on-upload-failure path.
pub struct RejectingBucket;

#[async_trait]
impl ObjectStorage for RejectingBucket {
    async fn upload(&self, _local: &std::path::Path, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("bucket unavailable")
    }

    async fn presigned_url(&self, _key: &str, _ttl: Duration) -> anyhow::Result<String> {
        anyhow::bail!("bucket unavailable")
    }
}

/// Session context wired to the mock platform and an in-memory store, with
/// timings shrunk so tests finish quickly.
pub fn test_context(
    platform: Arc<MockPlatform>,
    store: Arc<MemoryStore>,
    dir: &std::path::Path,
) -> SessionContext {
    SessionContext {
        platform,
        store,
        storage: None,
        rules: Arc::new(RuleSet::builtin()),
        recording: RecordingConfig {
            base_path: dir.join("recordings"),
            poll_interval: Duration::from_millis(10),
            max_poll_failures: 3,
            ..RecordingConfig::default()
        },
        artifacts: ArtifactsConfig {
            dir: dir.join("artifacts"),
            capture_audio: false,
            ..ArtifactsConfig::default()
        },
        limits: SessionLimits {
            max_call: Duration::from_secs(30),
            teardown_grace: Duration::from_secs(2),
        },
    }
}
