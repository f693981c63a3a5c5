use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{
    DialRequest, EgressInfo, MediaPlatform, ParticipantInfo, PlatformError, PlatformEvent,
};
use crate::audio::AudioFrame;

/// Media platform adapter speaking JSON request/reply and subscriptions over
/// NATS. The telephony bridge owns the actual SIP/media stack; this side only
/// issues commands and consumes per-room event/audio subjects.
pub struct NatsMediaPlatform {
    client: async_nats::Client,
    trunk_id: String,
}

#[derive(Debug, Serialize)]
struct RoomCommand<'a> {
    room: &'a str,
}

#[derive(Debug, Serialize)]
struct TransferCommand<'a> {
    room: &'a str,
    participant: &'a str,
    transfer_to: &'a str,
}

#[derive(Debug, Serialize)]
struct SayCommand<'a> {
    room: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct EgressCommand<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    egress_id: Option<&'a str>,
}

/// Generic command acknowledgement from the bridge.
#[derive(Debug, Deserialize)]
struct CommandReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    sip_status: Option<String>,
    #[serde(default)]
    participant_identity: Option<String>,
    #[serde(default)]
    egress_id: Option<String>,
    #[serde(default)]
    egress: Option<EgressInfo>,
}

/// Audio frame wire format: base64-encoded little-endian 16-bit PCM.
#[derive(Debug, Deserialize)]
struct AudioFrameMessage {
    pcm: String,
    sample_rate: u32,
    channels: u16,
    #[serde(default)]
    timestamp_ms: u64,
}

impl NatsMediaPlatform {
    pub async fn connect(url: &str, trunk_id: String) -> anyhow::Result<Self> {
        info!("connecting to telephony bridge at {url}");
        let client = async_nats::connect(url).await?;
        Ok(Self { client, trunk_id })
    }

    async fn request<T: Serialize>(
        &self,
        subject: &str,
        command: &T,
    ) -> Result<CommandReply, PlatformError> {
        let payload =
            serde_json::to_vec(command).map_err(|e| PlatformError::Transport(e.to_string()))?;
        let response = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        serde_json::from_slice(&response.payload)
            .map_err(|e| PlatformError::Transport(format!("bad reply on {subject}: {e}")))
    }

    fn check(reply: CommandReply) -> Result<CommandReply, PlatformError> {
        if reply.ok {
            return Ok(reply);
        }
        if let Some(sip_status) = reply.sip_status {
            return Err(PlatformError::Dial { sip_status });
        }
        Err(PlatformError::Rejected(
            reply.error.unwrap_or_else(|| "unspecified".to_string()),
        ))
    }
}

#[async_trait]
impl MediaPlatform for NatsMediaPlatform {
    async fn create_room(&self, room: &str) -> Result<(), PlatformError> {
        Self::check(self.request("telephony.room.create", &RoomCommand { room }).await?)?;
        Ok(())
    }

    async fn delete_room(&self, room: &str) -> Result<(), PlatformError> {
        Self::check(self.request("telephony.room.delete", &RoomCommand { room }).await?)?;
        Ok(())
    }

    async fn dial(&self, mut request: DialRequest) -> Result<ParticipantInfo, PlatformError> {
        if self.trunk_id.is_empty() {
            return Err(PlatformError::MissingCredentials);
        }
        request.trunk_id = self.trunk_id.clone();
        let reply = Self::check(self.request("telephony.sip.dial", &request).await?)?;
        let identity = reply
            .participant_identity
            .unwrap_or(request.participant_identity);
        Ok(ParticipantInfo { identity })
    }

    async fn transfer(
        &self,
        room: &str,
        participant: &str,
        transfer_to: &str,
    ) -> Result<(), PlatformError> {
        let command = TransferCommand {
            room,
            participant,
            transfer_to,
        };
        Self::check(self.request("telephony.sip.transfer", &command).await?)?;
        Ok(())
    }

    async fn say(&self, room: &str, text: &str) -> Result<(), PlatformError> {
        Self::check(self.request("telephony.speech.say", &SayCommand { room, text }).await?)?;
        Ok(())
    }

    async fn start_room_recording(&self, room: &str) -> Result<String, PlatformError> {
        let command = EgressCommand {
            room: Some(room),
            egress_id: None,
        };
        let reply = Self::check(self.request("telephony.egress.start", &command).await?)?;
        reply
            .egress_id
            .ok_or_else(|| PlatformError::Rejected("no egress id in reply".to_string()))
    }

    async fn stop_room_recording(&self, egress_id: &str) -> Result<(), PlatformError> {
        let command = EgressCommand {
            room: None,
            egress_id: Some(egress_id),
        };
        Self::check(self.request("telephony.egress.stop", &command).await?)?;
        Ok(())
    }

    async fn recording_status(
        &self,
        egress_id: &str,
    ) -> Result<Option<EgressInfo>, PlatformError> {
        let command = EgressCommand {
            room: None,
            egress_id: Some(egress_id),
        };
        let reply = self.request("telephony.egress.status", &command).await?;
        if !reply.ok {
            // The bridge answers ok=false when it no longer knows the job.
            return Ok(None);
        }
        Ok(reply.egress)
    }

    async fn subscribe_events(
        &self,
        room: &str,
    ) -> Result<mpsc::Receiver<PlatformEvent>, PlatformError> {
        let subject = format!("call.events.{room}");
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        info!("subscribed to {subject}");

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<PlatformEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("failed to parse platform event on {subject}: {e}"),
                }
            }
        });

        Ok(rx)
    }

    async fn subscribe_audio(
        &self,
        room: &str,
    ) -> Result<mpsc::Receiver<AudioFrame>, PlatformError> {
        let subject = format!("call.audio.{room}");
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        info!("subscribed to {subject}");

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let frame = match serde_json::from_slice::<AudioFrameMessage>(&msg.payload) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("failed to parse audio frame on {subject}: {e}");
                        continue;
                    }
                };
                let bytes = match base64::engine::general_purpose::STANDARD.decode(&frame.pcm) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("failed to decode PCM payload on {subject}: {e}");
                        continue;
                    }
                };
                let samples: Vec<i16> = bytes
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let frame = AudioFrame {
                    samples,
                    sample_rate: frame.sample_rate,
                    channels: frame.channels,
                    timestamp_ms: frame.timestamp_ms,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
