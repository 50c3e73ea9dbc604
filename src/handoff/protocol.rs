use crate::audio::ArtifactHandle;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A saved take on its way to the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistRequest {
    /// Idempotency key, one per saved take and reused across persist retries
    pub key: Uuid,
    pub step_index: usize,
    /// Step kind tag (e.g. "recording", "affirmation")
    pub step_kind: String,
    pub prompt_text: String,
    pub artifact: ArtifactHandle,
    pub requested_at: DateTime<Utc>,
}

/// What the journal returns for a persisted take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub entry_id: String,
    /// May be empty when no transcription is available
    pub transcript: String,
}

/// Persistent journal of completed reflection entries
#[async_trait::async_trait]
pub trait JournalStore: Send + Sync {
    /// Store a take
    ///
    /// Called again with the same `key` when an earlier attempt failed, so
    /// implementations should treat a repeated key as the same entry.
    async fn persist(&self, request: &PersistRequest) -> Result<PersistedEntry>;

    /// Record a committed sleep check-in value
    async fn record_sleep(&self, _step_index: usize, _hours: f64) -> Result<()> {
        Ok(())
    }
}

/// Downstream content analysis of a persisted transcript
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, transcript: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandoffError {
    #[error("Persist failed after {attempts} attempt(s): {message}")]
    PersistFailed { attempts: u32, message: String },

    #[error("Analysis of entry {entry_id} failed: {message}")]
    AnalysisFailed { entry_id: String, message: String },

    #[error("Sleep check-in could not be recorded: {message}")]
    SleepFailed { message: String },
}

/// Final report for one dispatched handoff
///
/// Exactly one outcome is reported per dispatch. Outcomes of different steps
/// arrive in whatever order their handoffs finish.
#[derive(Debug, Clone)]
pub struct HandoffOutcome {
    pub key: Uuid,
    pub step_index: usize,
    pub result: Result<Option<PersistedEntry>, HandoffError>,
}

impl HandoffOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
