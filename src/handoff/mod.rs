//! Handoff of saved takes to persistence and analysis
//!
//! This module provides:
//! - The `JournalStore` and `AnalysisService` collaborator contracts
//! - `HandoffDispatcher`, which spawns each handoff without blocking the session
//! - `HandoffMonitor`, the independent channel on which handoff outcomes arrive
//! - `JsonlJournal` and `LogAnalysis`, local collaborators for batch runs

mod dispatcher;
mod journal;
mod protocol;

pub use dispatcher::{HandoffConfig, HandoffDispatcher, HandoffMonitor, HandoffTally};
pub use journal::{JournalLine, JsonlJournal, LogAnalysis};
pub use protocol::{
    AnalysisService, HandoffError, HandoffOutcome, JournalStore, PersistRequest, PersistedEntry,
};
