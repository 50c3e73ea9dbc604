pub mod audio;
pub mod breathing;
pub mod config;
pub mod error;
pub mod handoff;
pub mod recording;
pub mod session;
pub mod timer;

pub use audio::{ArtifactHandle, AudioCapture, WavCaptureConfig, WavFileCapture};
pub use breathing::{
    BreathPhase, BreathingController, BreathingEvent, BreathingPattern, BreathingState,
};
pub use config::Config;
pub use error::SessionError;
pub use handoff::{
    AnalysisService, HandoffConfig, HandoffDispatcher, HandoffError, HandoffMonitor,
    HandoffOutcome, JournalStore, JsonlJournal, LogAnalysis, PersistRequest, PersistedEntry,
};
pub use recording::{AttemptState, RecordingController, RecordingEvent, SaveOutcome, StopReason};
pub use session::{
    SessionCommand, SessionConfig, SessionController, SessionEvent, SessionHandle, SessionRunner,
    SessionSnapshot, SessionState, Step, StepKind,
};
pub use timer::{Clock, CountdownTimer, ManualClock, SystemClock, TimerEvent};
