//! Session error taxonomy
//!
//! Retry exhaustion has no variant. A spent retry budget is a state
//! (`retries_remaining == 0`) and `retry()` in that state is a silent no-op.
//! Handoff failures live in [`crate::handoff::HandoffError`] and never reach
//! session flow.

use crate::breathing::BreathingPatternError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The capture device could not prepare or start a take
    #[error("Audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Cannot {operation}: {reason}")]
    InvalidTransition {
        operation: &'static str,
        reason: String,
    },

    /// The step has not met the completion criteria for its kind
    #[error("Step {index} ({kind}) is not eligible for completion")]
    NotEligible { index: usize, kind: &'static str },

    #[error("Step index {index} out of range (session has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("A session needs at least one step")]
    EmptyPlan,

    #[error(transparent)]
    InvalidBreathing(#[from] BreathingPatternError),
}

impl SessionError {
    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        SessionError::InvalidTransition {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether the caller may simply try the same action again later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::CaptureUnavailable(_))
    }
}
