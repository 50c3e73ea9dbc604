//! Paced breathing exercise
//!
//! A `BreathingController` loops inhale, hold, exhale, hold on top of a
//! `CountdownTimer` until the configured number of full cycles is reached.

mod cycle;
mod pattern;

pub use cycle::{BreathingController, BreathingEvent, BreathingState};
pub use pattern::{BreathPhase, BreathingPattern, BreathingPatternError};
