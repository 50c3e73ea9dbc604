use crate::breathing::{BreathPhase, BreathingState};
use crate::recording::AttemptState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a session is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active(usize),
    Finished,
}

/// Completion status of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub index: usize,
    pub kind: String,
    pub prompt: Option<String>,
    pub complete: bool,
}

/// Point-in-time view of a session for display or logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub state: SessionState,

    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub duration_secs: f64,

    pub steps: Vec<StepStatus>,

    /// Fraction of steps complete (0.0 to 1.0)
    pub progress: f64,

    pub attempt: AttemptState,

    pub remaining_secs: u32,

    pub retries_remaining: u32,

    pub breathing: BreathingState,

    pub breathing_phase: BreathPhase,

    pub breathing_cycles_completed: u32,
}

impl SessionSnapshot {
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.complete).count()
    }
}
