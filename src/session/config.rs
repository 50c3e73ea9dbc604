use crate::breathing::{BreathingPattern, BreathingPatternError};
use serde::{Deserialize, Serialize};

/// Tunables shared by every step of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recording budget for reflection prompts without their own
    /// Default: 60 seconds
    pub recording_budget_secs: u32,

    /// Recording budget for affirmations without their own
    /// Default: 30 seconds
    pub affirmation_budget_secs: u32,

    /// Retries granted on entering each recorded step
    pub retry_budget: u32,

    pub breathing_pattern: BreathingPattern,

    /// Full cycles before the breathing exercise completes
    pub breathing_cycles: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_budget_secs: 60,
            affirmation_budget_secs: 30,
            retry_budget: 2,
            breathing_pattern: BreathingPattern::box_breathing(),
            breathing_cycles: 12,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), BreathingPatternError> {
        self.breathing_pattern.validate()?;
        if self.breathing_cycles == 0 {
            return Err(BreathingPatternError::NoCycles);
        }
        Ok(())
    }
}
