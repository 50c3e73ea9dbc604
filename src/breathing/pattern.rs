use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four phases of a breathing cycle, in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    Inhale,
    HoldHigh,
    Exhale,
    HoldLow,
}

impl BreathPhase {
    pub const ALL: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::HoldHigh,
        BreathPhase::Exhale,
        BreathPhase::HoldLow,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn index(self) -> usize {
        match self {
            BreathPhase::Inhale => 0,
            BreathPhase::HoldHigh => 1,
            BreathPhase::Exhale => 2,
            BreathPhase::HoldLow => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreathingPatternError {
    #[error("Breathing phase {0:?} must last at least one second")]
    ZeroLengthPhase(BreathPhase),

    #[error("Breathing target must be at least one cycle")]
    NoCycles,
}

/// Seconds spent in each phase
///
/// Defaults to box breathing (4/4/4/4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingPattern {
    pub inhale: u32,
    pub hold_high: u32,
    pub exhale: u32,
    pub hold_low: u32,
}

impl BreathingPattern {
    pub fn new(
        inhale: u32,
        hold_high: u32,
        exhale: u32,
        hold_low: u32,
    ) -> Result<Self, BreathingPatternError> {
        let pattern = Self {
            inhale,
            hold_high,
            exhale,
            hold_low,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn box_breathing() -> Self {
        Self {
            inhale: 4,
            hold_high: 4,
            exhale: 4,
            hold_low: 4,
        }
    }

    pub fn validate(&self) -> Result<(), BreathingPatternError> {
        for phase in BreathPhase::ALL {
            if self.duration(phase) == 0 {
                return Err(BreathingPatternError::ZeroLengthPhase(phase));
            }
        }
        Ok(())
    }

    pub fn duration(&self, phase: BreathPhase) -> u32 {
        match phase {
            BreathPhase::Inhale => self.inhale,
            BreathPhase::HoldHigh => self.hold_high,
            BreathPhase::Exhale => self.exhale,
            BreathPhase::HoldLow => self.hold_low,
        }
    }

    /// Length of one full cycle in seconds
    pub fn cycle_secs(&self) -> u32 {
        BreathPhase::ALL.iter().map(|&p| self.duration(p)).sum()
    }
}

impl Default for BreathingPattern {
    fn default() -> Self {
        Self::box_breathing()
    }
}
