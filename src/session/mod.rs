//! Guided reflection session management
//!
//! This module provides the `SessionController` abstraction that manages:
//! - The ordered list of steps and the current-step cursor
//! - Per-step completion and the finish/dismiss rule
//! - The recording and breathing controllers of the current step
//! - Handing saved takes off to the journal without blocking
//! - Snapshots for display, and an async runner hosting the controller

mod config;
mod runner;
mod session;
mod stats;
mod step;

pub use config::SessionConfig;
pub use runner::{
    CommandReply, SessionCommand, SessionHandle, SessionRunner, DEFAULT_TICK_PERIOD,
};
pub use session::{SessionController, SessionEvent};
pub use stats::{SessionSnapshot, SessionState, StepStatus};
pub use step::{Step, StepKind};
