use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::recording::RecordingConfig;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub telephony: TelephonyConfig,
    pub recording: RecordingSection,
    pub artifacts: ArtifactsConfig,
    pub store: StoreConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub bind: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "outdial".to_string(),
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    pub nats_url: String,
    /// Outbound SIP trunk id; dialing fails fast when unset.
    pub trunk_id: String,
    /// Hard cap on connected call duration.
    pub max_call_secs: u64,
    /// Grace period for cancelling per-call tasks at teardown.
    pub teardown_grace_secs: u64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            trunk_id: String::new(),
            max_call_secs: 180,
            teardown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingSection {
    pub base_path: PathBuf,
    pub poll_interval_secs: u64,
    pub max_poll_failures: u32,
    /// Optional bucket root; recordings stay local when unset.
    pub bucket_path: Option<PathBuf>,
    pub upload_prefix: String,
    pub presign_ttl_secs: u64,
    pub delete_local_after_upload: bool,
}

impl Default for RecordingSection {
    fn default() -> Self {
        let d = RecordingConfig::default();
        Self {
            base_path: d.base_path,
            poll_interval_secs: d.poll_interval.as_secs(),
            max_poll_failures: d.max_poll_failures,
            bucket_path: None,
            upload_prefix: d.upload_prefix,
            presign_ttl_secs: d.presign_ttl.as_secs(),
            delete_local_after_upload: d.delete_local_after_upload,
        }
    }
}

impl RecordingSection {
    pub fn to_recording_config(&self) -> RecordingConfig {
        RecordingConfig {
            base_path: self.base_path.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll_failures: self.max_poll_failures,
            upload_prefix: self.upload_prefix.clone(),
            presign_ttl: Duration::from_secs(self.presign_ttl_secs),
            delete_local_after_upload: self.delete_local_after_upload,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    pub capture_audio: bool,
    /// Sample rate for the local WAV capture.
    pub sample_rate: u32,
    /// Samples retained in the artifact's audio preview.
    pub preview_samples: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            capture_audio: true,
            sample_rate: 16_000,
            preview_samples: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/calls.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Optional external rule table; the built-in rules apply when unset.
    pub rules_path: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
