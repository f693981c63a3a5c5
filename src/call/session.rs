use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::artifacts::{write_call_artifact, CallArtifact};
use super::dial::DialInfo;
use crate::audio::{FrameSample, WavSink};
use crate::config::ArtifactsConfig;
use crate::disposition::{
    dial_failure_disposition, Disposition, DispositionSnapshot, DispositionTracker, RuleSet,
    Speaker,
};
use crate::recording::{RecordingConfig, RecordingJob, RecordingMonitor};
use crate::storage::ObjectStorage;
use crate::store::CallStore;
use crate::telephony::{DialRequest, MediaPlatform, PlatformError, PlatformEvent};

/// Shared collaborators and policy for launching call sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub platform: Arc<dyn MediaPlatform>,
    pub store: Arc<dyn CallStore>,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub rules: Arc<RuleSet>,
    pub recording: RecordingConfig,
    pub artifacts: ArtifactsConfig,
    pub limits: SessionLimits,
}

#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Hard cap on connected call duration; expiry always ends the call.
    pub max_call: Duration,
    /// Grace period for cancelling per-call tasks at teardown.
    pub teardown_grace: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_call: Duration::from_secs(180),
            teardown_grace: Duration::from_secs(10),
        }
    }
}

/// Call lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Initiated,
    Dialing,
    Connected,
    InProgress,
    Completed,
    Failed,
}

/// Live view of a session for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct CallStatus {
    pub call_id: String,
    pub room: String,
    pub state: CallState,
    pub started_at: DateTime<Utc>,
    pub current_disposition: Option<Disposition>,
    pub transcript_len: usize,
    pub recording: Option<RecordingJob>,
}

/// Everything that can end or advance a session, funnelled through one queue
/// drained by a single task. Platform callbacks, the hard timeout and
/// operator requests all go through here, so session state only ever has one
/// logical writer.
#[derive(Debug)]
enum SessionEvent {
    Platform(PlatformEvent),
    HardTimeout,
    OperatorEnd,
}

#[derive(Debug)]
enum EndReason {
    Timeout,
    AgentEnd,
    OperatorEnd,
    Voicemail,
    OptOut,
    Transferred,
    TransferFailed,
    PlatformClosed,
    DialFailed { raw_status: String },
}

/// Per-call coordinator: owns the dial sequence, the concurrent tasks tied
/// to one active call (hard timeout, audio capture, event intake) and the
/// idempotent teardown that finalizes disposition and recording.
pub struct CallSession {
    call_id: String,
    room: String,
    dial: DialInfo,
    ctx: SessionContext,
    started_at: DateTime<Utc>,

    state: Mutex<CallState>,
    tracker: Mutex<DispositionTracker>,
    recording: RecordingMonitor,
    participant: Mutex<Option<String>>,

    // Dropped at teardown so the event consumer's channel closes.
    events_tx: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,

    torn_down: AtomicBool,
    done: AtomicBool,
    done_notify: Notify,

    capturing: AtomicBool,
    // Wakes the capture loop out of a quiet stream at teardown.
    capture_stop: Notify,
    audio_sample: Mutex<Option<FrameSample>>,
    wav_path: Mutex<Option<PathBuf>>,

    timeout_task: Mutex<Option<JoinHandle<()>>>,
    audio_task: Mutex<Option<JoinHandle<()>>>,
    forward_task: Mutex<Option<JoinHandle<()>>>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

impl CallSession {
    /// Create the session and start driving it. Returns immediately; the
    /// dial sequence runs on its own task.
    pub fn launch(ctx: SessionContext, call_id: String, room: String, dial: DialInfo) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(64);
        let recording = RecordingMonitor::new(
            Arc::clone(&ctx.platform),
            Arc::clone(&ctx.store),
            ctx.storage.clone(),
            ctx.recording.clone(),
        );
        let tracker = DispositionTracker::new(Arc::clone(&ctx.rules));

        let session = Arc::new(Self {
            call_id,
            room,
            dial,
            ctx,
            started_at: Utc::now(),
            state: Mutex::new(CallState::Initiated),
            tracker: Mutex::new(tracker),
            recording,
            participant: Mutex::new(None),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Mutex::new(Some(events_rx)),
            torn_down: AtomicBool::new(false),
            done: AtomicBool::new(false),
            done_notify: Notify::new(),
            capturing: AtomicBool::new(true),
            capture_stop: Notify::new(),
            audio_sample: Mutex::new(None),
            wav_path: Mutex::new(None),
            timeout_task: Mutex::new(None),
            audio_task: Mutex::new(None),
            forward_task: Mutex::new(None),
            drain_task: Mutex::new(None),
        });

        let driver = Arc::clone(&session);
        tokio::spawn(async move {
            driver.run().await;
        });

        session
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Drive the call: subscribe, dial, connect, arm the per-call tasks.
    async fn run(self: Arc<Self>) {
        info!(call_id = %self.call_id, room = %self.room, "starting call session");

        if let Err(e) = self
            .ctx
            .store
            .record_call_started(&self.call_id, &self.room, &self.dial.phone_number)
            .await
        {
            warn!(call_id = %self.call_id, "failed to persist call start: {e}");
        }

        // The event subscription must be live before the dial goes out so no
        // platform event is missed when the callee answers.
        let platform_rx = match self.ctx.platform.subscribe_events(&self.room).await {
            Ok(rx) => rx,
            Err(e) => {
                error!(call_id = %self.call_id, "failed to subscribe to session events: {e}");
                self.fail_dial(format!("error: {e}")).await;
                return;
            }
        };
        Arc::clone(&self).spawn_event_tasks(platform_rx).await;

        self.set_state(CallState::Dialing).await;
        let request = DialRequest {
            room: self.room.clone(),
            trunk_id: String::new(), // filled in by the platform adapter
            call_to: self.dial.dial_target().to_string(),
            participant_identity: self.dial.dial_target().to_string(),
            wait_until_answered: true,
        };

        let participant = match self.ctx.platform.dial(request).await {
            Ok(p) => p,
            Err(e) => {
                let raw_status = match &e {
                    PlatformError::Dial { sip_status } => sip_status.clone(),
                    other => format!("error: {other}"),
                };
                warn!(call_id = %self.call_id, raw_status = %raw_status, "dial failed");
                self.fail_dial(raw_status).await;
                return;
            }
        };
        info!(
            call_id = %self.call_id,
            participant = %participant.identity,
            "participant joined"
        );

        // The session may have been ended while the dial was in flight.
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut tracker = self.tracker.lock().await;
            tracker.set_connection_status(true);
        }
        {
            let mut slot = self.participant.lock().await;
            *slot = Some(participant.identity);
        }
        self.set_state(CallState::Connected).await;
        if let Err(e) = self.ctx.store.record_call_connected(&self.call_id).await {
            warn!(call_id = %self.call_id, "failed to persist call connect: {e}");
        }

        // Recording failure never aborts the call.
        let _ = self.recording.start(&self.room, &self.call_id).await;

        if self.ctx.artifacts.capture_audio {
            let capture = Arc::clone(&self);
            let task = tokio::spawn(async move {
                capture.run_audio_capture().await;
            });
            *self.audio_task.lock().await = Some(task);
        }

        // Hard cap, armed at participant join: expiry unconditionally ends
        // the session unless it already ended.
        let Some(timeout_tx) = self.event_sender().await else {
            return;
        };
        let max_call = self.ctx.limits.max_call;
        let task = tokio::spawn(async move {
            tokio::time::sleep(max_call).await;
            let _ = timeout_tx.send(SessionEvent::HardTimeout).await;
        });
        *self.timeout_task.lock().await = Some(task);

        self.set_state(CallState::InProgress).await;
    }

    async fn event_sender(&self) -> Option<mpsc::Sender<SessionEvent>> {
        self.events_tx.lock().await.clone()
    }

    async fn spawn_event_tasks(self: Arc<Self>, mut platform_rx: mpsc::Receiver<PlatformEvent>) {
        let Some(forward_tx) = self.event_sender().await else {
            return;
        };
        let forward = tokio::spawn(async move {
            while let Some(event) = platform_rx.recv().await {
                if forward_tx.send(SessionEvent::Platform(event)).await.is_err() {
                    break;
                }
            }
        });
        *self.forward_task.lock().await = Some(forward);

        let rx = self.events_rx.lock().await.take();
        let Some(mut rx) = rx else {
            // launch() seeds the receiver exactly once.
            return;
        };
        let consumer = Arc::clone(&self);
        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(reason) = consumer.handle_event(event).await {
                    consumer.teardown(reason).await;
                    break;
                }
            }
        });
        *self.drain_task.lock().await = Some(drain);
    }

    /// Apply one event. Returns the end reason when the session should tear
    /// down.
    async fn handle_event(&self, event: SessionEvent) -> Option<EndReason> {
        match event {
            SessionEvent::Platform(PlatformEvent::UtteranceTranscribed { speaker, text })
            | SessionEvent::Platform(PlatformEvent::ConversationItemAdded { speaker, text }) => {
                let mut tracker = self.tracker.lock().await;
                tracker.add_transcript_item(speaker, text);
                if speaker == Speaker::Customer {
                    // Live re-classification after every customer turn.
                    tracker.update_disposition(None);
                }
                None
            }
            SessionEvent::Platform(PlatformEvent::VoicemailDetected) => {
                info!(call_id = %self.call_id, "voicemail detected");
                Some(EndReason::Voicemail)
            }
            SessionEvent::Platform(PlatformEvent::EndCallRequested) => Some(EndReason::AgentEnd),
            SessionEvent::Platform(PlatformEvent::OptOutRequested) => {
                let mut tracker = self.tracker.lock().await;
                tracker.update_disposition(Some(Disposition::DoNotCall));
                Some(EndReason::OptOut)
            }
            SessionEvent::Platform(PlatformEvent::TransferRequested) => {
                self.handle_transfer().await
            }
            SessionEvent::Platform(PlatformEvent::SessionClosed) => {
                Some(EndReason::PlatformClosed)
            }
            SessionEvent::HardTimeout => {
                warn!(call_id = %self.call_id, "hard call timeout reached");
                Some(EndReason::Timeout)
            }
            SessionEvent::OperatorEnd => Some(EndReason::OperatorEnd),
        }
    }

    async fn handle_transfer(&self) -> Option<EndReason> {
        let Some(transfer_to) = self.dial.transfer_to.clone() else {
            warn!(
                call_id = %self.call_id,
                "transfer requested but no transfer target configured"
            );
            return None;
        };
        let participant = self.participant.lock().await.clone();
        let Some(participant) = participant else {
            warn!(call_id = %self.call_id, "transfer requested before participant joined");
            return None;
        };

        match self
            .ctx
            .platform
            .transfer(&self.room, &participant, &transfer_to)
            .await
        {
            Ok(()) => {
                info!(call_id = %self.call_id, transfer_to = %transfer_to, "call transferred");
                let mut tracker = self.tracker.lock().await;
                tracker.update_disposition(Some(Disposition::HumanHandoffRequested));
                Some(EndReason::Transferred)
            }
            Err(e) => {
                // The customer only hears an apology; the error stays in the
                // logs.
                error!(call_id = %self.call_id, "transfer failed: {e}");
                if let Err(e) = self
                    .ctx
                    .platform
                    .say(&self.room, "I'm sorry, I wasn't able to transfer your call.")
                    .await
                {
                    warn!(call_id = %self.call_id, "failed to play transfer apology: {e}");
                }
                Some(EndReason::TransferFailed)
            }
        }
    }

    /// Dial never connected: classify the failure and end cleanly.
    async fn fail_dial(&self, raw_status: String) {
        {
            let mut tracker = self.tracker.lock().await;
            tracker.set_connection_status(false);
            let disposition =
                dial_failure_disposition(&raw_status).unwrap_or(Disposition::Failed);
            tracker.update_disposition(Some(disposition));
        }
        self.teardown(EndReason::DialFailed { raw_status }).await;
    }

    /// Finalize the session. Safe to invoke more than once: only the first
    /// caller does any work, so a timeout racing an explicit end still yields
    /// exactly one persisted record.
    async fn teardown(&self, reason: EndReason) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(call_id = %self.call_id, ?reason, "tearing down call session");

        // Cancellations are independent and best-effort: a failure in one
        // never blocks the others.
        if let Some(task) = self.timeout_task.lock().await.take() {
            task.abort();
        }

        self.recording.shutdown(self.ctx.limits.teardown_grace).await;

        self.capturing.store(false, Ordering::SeqCst);
        self.capture_stop.notify_waiters();
        let audio_task = self.audio_task.lock().await.take();
        if let Some(mut task) = audio_task {
            if tokio::time::timeout(self.ctx.limits.teardown_grace, &mut task)
                .await
                .is_err()
            {
                warn!(call_id = %self.call_id, "audio capture did not stop in time, aborting");
                task.abort();
            }
        }

        let dial_failed = matches!(reason, EndReason::DialFailed { .. });
        let snapshot = {
            let mut tracker = self.tracker.lock().await;
            if !dial_failed && !tracker.was_forced() {
                tracker.update_disposition(None);
            }
            tracker.snapshot()
        };

        let recording_job = self.recording.job().await;
        let recording_url = recording_job.as_ref().and_then(|j| j.file_url.clone());

        match &reason {
            EndReason::DialFailed { raw_status } => {
                self.set_state(CallState::Failed).await;
                let disposition = snapshot.disposition.unwrap_or(Disposition::Failed);
                if let Err(e) = self
                    .ctx
                    .store
                    .record_call_failed(&self.call_id, disposition, raw_status)
                    .await
                {
                    warn!(call_id = %self.call_id, "failed to persist call failure: {e}");
                }
            }
            _ => {
                self.set_state(CallState::Completed).await;
                if let Err(e) = self
                    .ctx
                    .store
                    .record_call_completed(&self.call_id, &snapshot, recording_url.as_deref())
                    .await
                {
                    warn!(call_id = %self.call_id, "failed to persist call completion: {e}");
                }
            }
        }

        let artifact = CallArtifact {
            room: self.room.clone(),
            phone: self.dial.phone_number.clone(),
            transcript: snapshot.transcript.clone(),
            disposition: snapshot,
            audio_sample: self.audio_sample.lock().await.take(),
            audio_path: self.wav_path.lock().await.clone(),
            call_start: self.started_at.timestamp(),
            call_end: Utc::now().timestamp(),
        };
        if let Err(e) =
            write_call_artifact(&self.ctx.artifacts.dir, &self.call_id, &artifact).await
        {
            warn!(call_id = %self.call_id, "failed to write call artifact: {e}");
        }

        if let Err(e) = self.ctx.platform.delete_room(&self.room).await {
            warn!(call_id = %self.call_id, "failed to release room: {e}");
        }

        if let Some(task) = self.forward_task.lock().await.take() {
            task.abort();
        }
        // Close the event queue so the consumer task drains out and exits.
        self.events_tx.lock().await.take();

        self.done.store(true, Ordering::SeqCst);
        self.done_notify.notify_waiters();
        info!(call_id = %self.call_id, "call session finished");
    }

    /// Consume the room's audio stream into a mono 16-bit WAV, keeping only
    /// a size-capped sample in memory for the artifact.
    async fn run_audio_capture(&self) {
        let mut rx = match self.ctx.platform.subscribe_audio(&self.room).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(call_id = %self.call_id, "failed to subscribe to call audio: {e}");
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.ctx.artifacts.dir).await {
            warn!(call_id = %self.call_id, "failed to create artifacts dir: {e}");
            return;
        }
        let filename = format!(
            "{}_{}.wav",
            self.room,
            self.started_at.format("%Y%m%d%H%M%S")
        );
        let path = self.ctx.artifacts.dir.join(filename);
        let sample_rate = self.ctx.artifacts.sample_rate;
        let mut sink = match WavSink::create(&path, sample_rate) {
            Ok(sink) => sink,
            Err(e) => {
                warn!(call_id = %self.call_id, "failed to open audio capture file: {e}");
                return;
            }
        };
        let mut sample = FrameSample::new(self.ctx.artifacts.preview_samples);

        // The stream can go quiet indefinitely, so the stop signal must be
        // able to interrupt a pending recv.
        loop {
            if !self.capturing.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                maybe = rx.recv() => {
                    let Some(frame) = maybe else {
                        break;
                    };
                    let frame = frame.to_mono().decimate_to(sample_rate);
                    sample.push(&frame);
                    if let Err(e) = sink.write_frame(&frame) {
                        error!(call_id = %self.call_id, "audio capture write failed: {e}");
                        break;
                    }
                }
                _ = self.capture_stop.notified() => break,
            }
        }

        match sink.finalize() {
            Ok(stats) => {
                *self.wav_path.lock().await = Some(stats.path);
            }
            Err(e) => error!(call_id = %self.call_id, "failed to finalize audio capture: {e}"),
        }
        *self.audio_sample.lock().await = Some(sample);
    }

    async fn set_state(&self, state: CallState) {
        let mut current = self.state.lock().await;
        *current = state;
    }

    /// Request an operator end. Queued behind any event already in flight;
    /// a no-op if the session already finished.
    pub async fn end(&self) {
        let sent = match self.event_sender().await {
            Some(tx) => tx.send(SessionEvent::OperatorEnd).await.is_ok(),
            None => false,
        };
        if !sent {
            // Event consumer already gone; fall back to direct teardown,
            // which is a no-op when the session is finished.
            self.teardown(EndReason::OperatorEnd).await;
        }
    }

    /// Wait for the session to finish. Safe against completion racing the
    /// wait.
    pub async fn wait(&self) {
        loop {
            let notified = self.done_notify.notified();
            if self.done.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> CallStatus {
        let state = *self.state.lock().await;
        let (current_disposition, transcript_len) = {
            let tracker = self.tracker.lock().await;
            (tracker.current_disposition(), tracker.transcript().len())
        };
        CallStatus {
            call_id: self.call_id.clone(),
            room: self.room.clone(),
            state,
            started_at: self.started_at,
            current_disposition,
            transcript_len,
            recording: self.recording.job().await,
        }
    }

    /// Final disposition view; most useful after [`wait`](Self::wait).
    pub async fn snapshot(&self) -> DispositionSnapshot {
        self.tracker.lock().await.snapshot()
    }
}
