use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::audio::FrameSample;
use crate::disposition::{DispositionSnapshot, TranscriptItem};

/// JSON snapshot of one finished call, written next to the audio capture.
#[derive(Debug, Clone, Serialize)]
pub struct CallArtifact {
    pub room: String,
    pub phone: String,
    pub transcript: Vec<TranscriptItem>,
    pub disposition: DispositionSnapshot,
    pub audio_sample: Option<FrameSample>,
    /// Local WAV capture, when audio capture was enabled and succeeded.
    pub audio_path: Option<PathBuf>,
    /// Epoch seconds.
    pub call_start: i64,
    pub call_end: i64,
}

/// Write the call artifact as `{call_id}.json` under the artifacts dir.
pub async fn write_call_artifact(
    dir: &Path,
    call_id: &str,
    artifact: &CallArtifact,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create artifacts dir {}", dir.display()))?;
    let path = dir.join(format!("{call_id}.json"));
    let json = serde_json::to_vec_pretty(artifact).context("failed to serialize call artifact")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("failed to write call artifact {}", path.display()))?;
    Ok(path)
}
