use super::attempt::{AttemptState, RecordingAttempt, SaveOutcome, StopReason};
use crate::audio::{ArtifactHandle, AudioCapture};
use crate::error::SessionError;
use crate::timer::{Clock, CountdownTimer, TimerEvent};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEvent {
    Started { budget_secs: u32 },
    Tick { remaining: u32 },
    Stopped { reason: StopReason, has_artifact: bool },
    Retried { retries_remaining: u32 },
    Saved { outcome: SaveOutcome },
}

/// Mediates recording takes through the shared capture device
///
/// This is the only code that drives the device. Every path out of
/// `Recording` stops it, and every discarded take resets it, so the device
/// is never left holding an orphaned take.
pub struct RecordingController {
    capture: Box<dyn AudioCapture>,
    timer: CountdownTimer,
    attempt: RecordingAttempt,
    retry_budget: u32,
    events: Vec<RecordingEvent>,
}

impl RecordingController {
    pub fn new(capture: Box<dyn AudioCapture>, clock: Arc<dyn Clock>, retry_budget: u32) -> Self {
        Self {
            capture,
            timer: CountdownTimer::new(clock),
            attempt: RecordingAttempt::fresh(retry_budget),
            retry_budget,
            events: Vec::new(),
        }
    }

    pub fn attempt(&self) -> &RecordingAttempt {
        &self.attempt
    }

    pub fn state(&self) -> AttemptState {
        self.attempt.state
    }

    pub fn is_recording(&self) -> bool {
        self.attempt.state == AttemptState::Recording
    }

    pub fn capture_name(&self) -> &str {
        self.capture.name()
    }

    /// Events produced since the last drain, in order
    pub fn drain_events(&mut self) -> Vec<RecordingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start a take that auto-stops after `budget_secs`
    pub async fn begin_recording(&mut self, budget_secs: u32) -> Result<(), SessionError> {
        if self.attempt.state != AttemptState::Idle {
            return Err(SessionError::invalid(
                "begin recording",
                format!("attempt is {:?}", self.attempt.state),
            ));
        }

        if let Err(e) = self.capture.prepare_for_new_recording().await {
            warn!("Capture device {} not ready: {:#}", self.capture.name(), e);
            return Err(SessionError::CaptureUnavailable(format!("{:#}", e)));
        }

        if let Err(e) = self.capture.start_recording().await {
            error!("Capture device {} failed to start: {:#}", self.capture.name(), e);
            if let Err(reset_err) = self.capture.reset().await {
                error!("Failed to reset capture device: {:#}", reset_err);
            }
            return Err(SessionError::CaptureUnavailable(format!("{:#}", e)));
        }

        info!("Recording started ({}s budget)", budget_secs);

        self.attempt.state = AttemptState::Recording;
        self.attempt.budget_secs = budget_secs;
        self.attempt.remaining_secs = budget_secs;
        self.attempt.stop_reason = None;
        self.attempt.artifact = None;
        self.timer.start(budget_secs);
        self.events.push(RecordingEvent::Started { budget_secs });

        Ok(())
    }

    /// End the current take. Returns false when no take was running.
    pub async fn stop_recording(&mut self, reason: StopReason) -> bool {
        if self.attempt.state != AttemptState::Recording {
            debug!("Stop ignored: attempt is {:?}", self.attempt.state);
            return false;
        }

        self.timer.cancel();

        if let Err(e) = self.capture.stop_recording().await {
            error!("Capture device {} failed to stop: {:#}", self.capture.name(), e);
        }

        let artifact = self.capture.current_artifact();
        let has_artifact = artifact.is_some();
        if !has_artifact {
            warn!("Recording stopped ({:?}) without an artifact", reason);
        } else {
            info!("Recording stopped ({:?})", reason);
        }

        self.attempt.state = AttemptState::PendingReview;
        self.attempt.stop_reason = Some(reason);
        self.attempt.artifact = artifact;
        self.events.push(RecordingEvent::Stopped {
            reason,
            has_artifact,
        });

        true
    }

    /// Discard the pending take and return to `Idle`, spending one retry
    ///
    /// A no-op when not pending review or when the budget is spent.
    pub async fn retry(&mut self) -> bool {
        if self.attempt.state != AttemptState::PendingReview {
            debug!("Retry ignored: attempt is {:?}", self.attempt.state);
            return false;
        }
        if self.attempt.retries_remaining == 0 {
            debug!("Retry ignored: no retries remaining");
            return false;
        }

        self.attempt.artifact = None;
        if let Err(e) = self.capture.reset().await {
            error!("Failed to reset capture device: {:#}", e);
        }

        self.attempt.retries_remaining -= 1;
        self.attempt.state = AttemptState::Idle;
        self.attempt.remaining_secs = self.attempt.budget_secs;
        self.attempt.stop_reason = None;

        info!(
            "Recording discarded for retry ({} retries left)",
            self.attempt.retries_remaining
        );
        self.events.push(RecordingEvent::Retried {
            retries_remaining: self.attempt.retries_remaining,
        });

        true
    }

    /// Accept the pending take and pass its artifact to `on_persist`
    ///
    /// `on_persist` runs at most once, and not at all when the take produced
    /// nothing. The attempt stays in `Saving` until the step is left.
    pub fn complete_and_save<F>(&mut self, on_persist: F) -> Result<SaveOutcome, SessionError>
    where
        F: FnOnce(ArtifactHandle),
    {
        if self.attempt.state != AttemptState::PendingReview {
            return Err(SessionError::invalid(
                "save recording",
                format!("attempt is {:?}", self.attempt.state),
            ));
        }

        self.attempt.state = AttemptState::Saving;

        let outcome = match self.attempt.artifact.take() {
            Some(artifact) => {
                info!("Saving recording {}", artifact.id);
                on_persist(artifact);
                SaveOutcome::Dispatched
            }
            None => {
                warn!("Nothing to save: take produced no artifact");
                SaveOutcome::NothingToSave
            }
        };

        self.events.push(RecordingEvent::Saved { outcome });
        Ok(outcome)
    }

    /// Drive the budget countdown; auto-stops the take when it runs out
    pub async fn poll(&mut self) {
        if self.attempt.state != AttemptState::Recording {
            return;
        }

        let mut timed_out = false;
        for tick in self.timer.poll() {
            match tick {
                TimerEvent::Tick { remaining } => {
                    self.attempt.remaining_secs = remaining;
                    self.events.push(RecordingEvent::Tick { remaining });
                }
                TimerEvent::Completed => timed_out = true,
            }
        }

        if timed_out {
            info!("Recording budget exhausted");
            self.stop_recording(StopReason::TimedOut).await;
        }
    }

    /// Tear down the current take and restore a fresh attempt with a full retry budget
    pub async fn release(&mut self) {
        self.timer.cancel();

        match self.attempt.state {
            AttemptState::Recording => {
                if let Err(e) = self.capture.stop_recording().await {
                    error!("Capture device {} failed to stop: {:#}", self.capture.name(), e);
                }
                self.reset_device().await;
            }
            AttemptState::PendingReview => self.reset_device().await,
            AttemptState::Idle | AttemptState::Saving => {}
        }

        self.attempt = RecordingAttempt::fresh(self.retry_budget);
    }

    async fn reset_device(&mut self) {
        if let Err(e) = self.capture.reset().await {
            error!("Failed to reset capture device: {:#}", e);
        }
    }
}
