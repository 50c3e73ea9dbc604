//! Recording takes against the shared capture device
//!
//! One `RecordingController` per session drives the capture device through
//! record, timed auto-stop, review, bounded retry and save.

mod attempt;
mod controller;

pub use attempt::{AttemptState, RecordingAttempt, SaveOutcome, StopReason};
pub use controller::{RecordingController, RecordingEvent};
