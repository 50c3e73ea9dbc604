use super::capture::{ArtifactHandle, AudioCapture};
use crate::timer::Clock;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Output settings for [`WavFileCapture`]
#[derive(Debug, Clone)]
pub struct WavCaptureConfig {
    /// Directory receiving one WAV file per take
    pub output_dir: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

impl WavCaptureConfig {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

struct Take {
    id: Uuid,
    started_at: Duration,
}

/// File-backed capture device
///
/// Renders the clock time elapsed during a take as 16-bit PCM silence, one
/// `take-<uuid>.wav` per take. Used for batch runs and tests where no
/// microphone exists. A take shorter than one second yields no artifact.
pub struct WavFileCapture {
    config: WavCaptureConfig,
    clock: Arc<dyn Clock>,
    prepared: bool,
    take: Option<Take>,
    artifact: Option<ArtifactHandle>,
}

impl WavFileCapture {
    pub fn new(config: WavCaptureConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            prepared: false,
            take: None,
            artifact: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.take.is_some()
    }

    fn write_take(&self, id: Uuid, secs: u64) -> Result<ArtifactHandle> {
        let path = self.config.output_dir.join(format!("take-{}.wav", id));

        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer: hound::WavWriter<BufWriter<File>> = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        let sample_count = secs * self.config.sample_rate as u64 * self.config.channels as u64;
        for _ in 0..sample_count {
            writer
                .write_sample(0i16)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        let mut artifact = ArtifactHandle::new(path, Duration::from_secs(secs));
        artifact.id = id;
        Ok(artifact)
    }
}

#[async_trait::async_trait]
impl AudioCapture for WavFileCapture {
    async fn prepare_for_new_recording(&mut self) -> Result<()> {
        if self.take.is_some() {
            anyhow::bail!("A take is still being captured");
        }

        fs::create_dir_all(&self.config.output_dir)
            .context("Failed to create capture output directory")?;

        // The previous artifact may be in flight to the journal; forget it, keep the file
        self.artifact = None;
        self.prepared = true;
        Ok(())
    }

    async fn start_recording(&mut self) -> Result<()> {
        if !self.prepared {
            anyhow::bail!("Capture device was not prepared");
        }
        if self.take.is_some() {
            anyhow::bail!("Capture already in progress");
        }

        let take = Take {
            id: Uuid::new_v4(),
            started_at: self.clock.elapsed(),
        };
        info!("Capture started: take {}", take.id);
        self.take = Some(take);
        self.prepared = false;
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        let Some(take) = self.take.take() else {
            return Ok(());
        };

        let secs = self
            .clock
            .elapsed()
            .saturating_sub(take.started_at)
            .as_secs();
        if secs == 0 {
            info!("Capture stopped: take {} is empty", take.id);
            return Ok(());
        }

        let artifact = self.write_take(take.id, secs)?;
        info!(
            "Capture stopped: take {} ({}s) -> {}",
            take.id,
            secs,
            artifact.path.display()
        );
        self.artifact = Some(artifact);
        Ok(())
    }

    fn current_artifact(&self) -> Option<ArtifactHandle> {
        self.artifact.clone()
    }

    async fn reset(&mut self) -> Result<()> {
        self.take = None;
        self.prepared = false;

        if let Some(artifact) = self.artifact.take() {
            match fs::remove_file(&artifact.path) {
                Ok(()) => info!("Discarded take {}", artifact.id),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete discarded take {}: {}", artifact.id, e),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
