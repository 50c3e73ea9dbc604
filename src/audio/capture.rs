use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Captured output of one recording take
///
/// Opaque to the session beyond its existence and duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub id: Uuid,
    /// Where the capture device left the audio
    pub path: PathBuf,
    pub duration: Duration,
    pub captured_at: DateTime<Utc>,
}

impl ArtifactHandle {
    pub fn new(path: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            duration,
            captured_at: Utc::now(),
        }
    }
}

/// The single audio capture device shared by all recording steps
///
/// Platform implementations own microphone access and encoding; the session
/// only sequences calls. Exactly one take is held at a time:
/// `prepare_for_new_recording` → `start_recording` → `stop_recording`, then
/// either the artifact is handed off or `reset` discards it.
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Get the device ready for a fresh take
    ///
    /// Fails when the device cannot record (e.g. permission denied).
    async fn prepare_for_new_recording(&mut self) -> Result<()>;

    async fn start_recording(&mut self) -> Result<()>;

    async fn stop_recording(&mut self) -> Result<()>;

    /// Artifact of the last stopped take, if it produced one
    fn current_artifact(&self) -> Option<ArtifactHandle>;

    /// Drop any take in progress or pending review and return to a clean state
    async fn reset(&mut self) -> Result<()>;

    /// Device name for logging
    fn name(&self) -> &str;
}
