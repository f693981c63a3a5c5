//! Call audio capture: the frame type delivered by the media platform, a WAV
//! sink that streams frames to disk (mono, 16-bit PCM), and a size-capped
//! sample kept for the call artifact.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A block of PCM samples received from the media platform.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Downmix to mono by summing channel pairs. Frames that are already mono
    /// (or not stereo) pass through unchanged.
    pub fn to_mono(self) -> AudioFrame {
        if self.channels != 2 {
            return self;
        }
        let mono: Vec<i16> = self
            .samples
            .chunks_exact(2)
            .map(|pair| {
                let sum = pair[0] as i32 + pair[1] as i32;
                sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect();
        AudioFrame {
            samples: mono,
            channels: 1,
            ..self
        }
    }

    /// Reduce the sample rate by decimation. Upsampling is not supported;
    /// frames at or below the target rate pass through unchanged.
    pub fn decimate_to(self, target_rate: u32) -> AudioFrame {
        if target_rate == 0 || self.sample_rate <= target_rate {
            return self;
        }
        let ratio = (self.sample_rate / target_rate) as usize;
        if ratio <= 1 {
            return self;
        }
        let samples: Vec<i16> = self.samples.iter().step_by(ratio).copied().collect();
        AudioFrame {
            samples,
            sample_rate: target_rate,
            ..self
        }
    }
}

/// Streams frames to a 16-bit PCM WAV file as they arrive, so raw audio is
/// never buffered in memory for the whole call.
pub struct WavSink {
    writer: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
    path: PathBuf,
    sample_rate: u32,
    samples_written: u64,
}

/// Final stats for a completed WAV capture.
#[derive(Debug, Clone, Serialize)]
pub struct WavStats {
    pub path: PathBuf,
    pub samples: u64,
    pub duration_secs: f64,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create WAV file {}", path.display()))?;
        Ok(Self {
            writer,
            path,
            sample_rate,
            samples_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        for &sample in &frame.samples {
            self.writer
                .write_sample(sample)
                .context("failed to write audio sample")?;
        }
        self.samples_written += frame.samples.len() as u64;
        Ok(())
    }

    pub fn finalize(self) -> Result<WavStats> {
        let stats = WavStats {
            path: self.path.clone(),
            samples: self.samples_written,
            duration_secs: self.samples_written as f64 / self.sample_rate as f64,
        };
        self.writer
            .finalize()
            .context("failed to finalize WAV file")?;
        info!(
            path = %stats.path.display(),
            duration_secs = stats.duration_secs,
            "audio capture finalized"
        );
        Ok(stats)
    }
}

/// Size-capped sample of the captured audio, embedded in the call artifact.
/// Counts every frame but retains only a bounded preview of samples.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSample {
    pub frames: u64,
    pub samples: u64,
    pub sample_rate: u32,
    pub preview: Vec<i16>,
    #[serde(skip)]
    max_preview: usize,
}

impl FrameSample {
    pub fn new(max_preview: usize) -> Self {
        Self {
            frames: 0,
            samples: 0,
            sample_rate: 0,
            preview: Vec::new(),
            max_preview,
        }
    }

    pub fn push(&mut self, frame: &AudioFrame) {
        self.frames += 1;
        self.samples += frame.samples.len() as u64;
        self.sample_rate = frame.sample_rate;
        let room = self.max_preview.saturating_sub(self.preview.len());
        if room > 0 {
            self.preview
                .extend(frame.samples.iter().take(room).copied());
        }
    }
}
