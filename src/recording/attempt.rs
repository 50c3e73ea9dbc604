use crate::audio::ArtifactHandle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Recording,
    PendingReview,
    Saving,
}

/// Why a take ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Manual,
    TimedOut,
}

/// Result of `complete_and_save`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The artifact was passed to the persist callback
    Dispatched,
    /// The take produced no artifact; nothing was handed off
    NothingToSave,
}

/// The recording take of the current step
#[derive(Debug, Clone)]
pub struct RecordingAttempt {
    pub state: AttemptState,
    /// Seconds left before auto-stop
    pub remaining_secs: u32,
    pub retries_remaining: u32,
    pub budget_secs: u32,
    pub stop_reason: Option<StopReason>,
    pub(crate) artifact: Option<ArtifactHandle>,
}

impl RecordingAttempt {
    pub(crate) fn fresh(retries: u32) -> Self {
        Self {
            state: AttemptState::Idle,
            remaining_secs: 0,
            retries_remaining: retries,
            budget_secs: 0,
            stop_reason: None,
            artifact: None,
        }
    }

    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        self.artifact.as_ref()
    }

    /// Whether a retry affordance should be offered
    pub fn can_retry(&self) -> bool {
        self.state == AttemptState::PendingReview && self.retries_remaining > 0
    }
}
