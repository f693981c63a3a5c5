//! Boundary to the real-time media/SIP telephony and speech-AI platform.
//!
//! The engine only issues commands to the platform and consumes events from
//! it; everything behind [`MediaPlatform`] (media transport, speech
//! recognition/synthesis, SIP signalling) is external. The production
//! implementation speaks JSON over NATS ([`NatsMediaPlatform`]); tests
//! substitute a scripted mock.

mod nats;

pub use nats::NatsMediaPlatform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::disposition::Speaker;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The dial attempt did not connect; carries the raw SIP status text
    /// ("486 Busy Here", "no answer", ...) for disposition classification.
    #[error("dial failed: {sip_status}")]
    Dial { sip_status: String },

    #[error("platform credentials missing or invalid")]
    MissingCredentials,

    #[error("platform rejected request: {0}")]
    Rejected(String),

    #[error("platform transport error: {0}")]
    Transport(String),
}

/// Parameters for an outbound dial.
#[derive(Debug, Clone, Serialize)]
pub struct DialRequest {
    pub room: String,
    pub trunk_id: String,
    pub call_to: String,
    pub participant_identity: String,
    /// Block until the callee answers (or the dial fails).
    pub wait_until_answered: bool,
}

/// The remote participant created by a successful dial.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantInfo {
    pub identity: String,
}

/// Inbound platform events for one call session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// A user utterance finished transcribing.
    UtteranceTranscribed { speaker: Speaker, text: String },
    /// A conversation item (agent or customer) was committed to the session.
    ConversationItemAdded { speaker: Speaker, text: String },
    /// The speech agent detected an answering machine.
    VoicemailDetected,
    /// The speech agent's end-call tool fired.
    EndCallRequested,
    /// The customer asked for a human; the agent confirmed the transfer.
    TransferRequested,
    /// The customer opted out of future calls.
    OptOutRequested,
    /// The platform closed the session.
    SessionClosed,
}

/// Recording job state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressState {
    Starting,
    Active,
    Complete,
    Failed,
}

/// Status of one recording job, from the platform's job listing.
#[derive(Debug, Clone, Deserialize)]
pub struct EgressInfo {
    pub status: EgressState,
    pub file_path: Option<PathBuf>,
    pub duration_secs: Option<f64>,
}

/// Commands and subscriptions the engine needs from the telephony platform.
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    async fn create_room(&self, room: &str) -> Result<(), PlatformError>;

    async fn delete_room(&self, room: &str) -> Result<(), PlatformError>;

    /// Dial the customer into the room. With `wait_until_answered` this
    /// resolves only once the callee picks up, or fails with the SIP status.
    async fn dial(&self, request: DialRequest) -> Result<ParticipantInfo, PlatformError>;

    /// Transfer the remote participant to another number.
    async fn transfer(
        &self,
        room: &str,
        participant: &str,
        transfer_to: &str,
    ) -> Result<(), PlatformError>;

    /// Ask the speech agent to say something (e.g. an apology before hanging
    /// up after a failed transfer).
    async fn say(&self, room: &str, text: &str) -> Result<(), PlatformError>;

    /// Start a room recording job; returns the platform's egress id.
    async fn start_room_recording(&self, room: &str) -> Result<String, PlatformError>;

    /// Best-effort stop of an in-progress recording job.
    async fn stop_room_recording(&self, egress_id: &str) -> Result<(), PlatformError>;

    /// Look up one recording job. `Ok(None)` means the platform no longer
    /// knows the job.
    async fn recording_status(&self, egress_id: &str)
        -> Result<Option<EgressInfo>, PlatformError>;

    /// Subscribe to session events for a room. Must complete before the dial
    /// is issued so no event is missed.
    async fn subscribe_events(
        &self,
        room: &str,
    ) -> Result<mpsc::Receiver<PlatformEvent>, PlatformError>;

    /// Subscribe to the room's live audio frames.
    async fn subscribe_audio(
        &self,
        room: &str,
    ) -> Result<mpsc::Receiver<AudioFrame>, PlatformError>;
}
