use super::capture::ArtifactHandle;
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::time::Duration;
use tracing::info;

impl ArtifactHandle {
    /// Build a handle for an existing WAV file, reading its duration from the header
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Probing audio artifact: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_rate == 0 {
            anyhow::bail!("WAV file {} declares a zero sample rate", path.display());
        }

        // hound reports duration in samples per channel
        let frames = reader.duration() as f64;
        let duration = Duration::from_secs_f64(frames / spec.sample_rate as f64);

        info!(
            "Artifact probed: {:.1}s, {}Hz, {} channels",
            duration.as_secs_f64(),
            spec.sample_rate,
            spec.channels
        );

        Ok(Self::new(path, duration))
    }
}
