use super::config::SessionConfig;
use super::stats::{SessionSnapshot, SessionState, StepStatus};
use super::step::{Step, StepKind};
use crate::audio::AudioCapture;
use crate::breathing::{BreathingController, BreathingEvent, BreathingState};
use crate::error::SessionError;
use crate::handoff::{HandoffDispatcher, PersistRequest};
use crate::recording::{
    AttemptState, RecordingAttempt, RecordingController, RecordingEvent, SaveOutcome, StopReason,
};
use crate::timer::Clock;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Something the UI layer should react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StepEntered { index: usize, kind: &'static str },
    StepCompleted { index: usize },
    StepSkipped { index: usize },
    Recording { index: usize, event: RecordingEvent },
    Breathing { index: usize, event: BreathingEvent },
    HandoffDispatched { index: usize, key: Uuid },
    SleepCommitted { index: usize, hours: f64 },
    Finished,
}

/// Drives a user through an ordered list of steps
///
/// Owns the steps, the cursor, and the per-step recording and breathing
/// controllers. Only the current step's controller is ever active; entering
/// another step tears both down first.
pub struct SessionController {
    session_id: String,
    plan: Vec<StepKind>,
    steps: Vec<Step>,
    state: SessionState,
    config: SessionConfig,
    recording: RecordingController,
    breathing: BreathingController,
    handoff: HandoffDispatcher,
    events: Vec<SessionEvent>,
    started_at: chrono::DateTime<Utc>,
}

impl SessionController {
    pub fn new(
        plan: Vec<StepKind>,
        config: SessionConfig,
        capture: Box<dyn AudioCapture>,
        handoff: HandoffDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        if plan.is_empty() {
            return Err(SessionError::EmptyPlan);
        }
        config.validate()?;

        let session_id = format!("reflection-{}", Uuid::new_v4());
        info!(
            "Creating reflection session {} with {} steps (capture: {})",
            session_id,
            plan.len(),
            capture.name()
        );

        let recording =
            RecordingController::new(capture, Arc::clone(&clock), config.retry_budget);
        let breathing = BreathingController::new(
            clock,
            config.breathing_pattern,
            config.breathing_cycles,
        )?;
        let steps = plan.iter().cloned().map(Step::new).collect();

        Ok(Self {
            session_id,
            events: vec![SessionEvent::StepEntered {
                index: 0,
                kind: plan[0].tag(),
            }],
            plan,
            steps,
            state: SessionState::Active(0),
            config,
            recording,
            breathing,
            handoff,
            started_at: Utc::now(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Active(index) => Some(index),
            SessionState::Finished => None,
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_index().map(|index| &self.steps[index])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn recording(&self) -> &RecordingAttempt {
        self.recording.attempt()
    }

    pub fn breathing(&self) -> &BreathingController {
        &self.breathing
    }

    /// Fraction of steps complete
    pub fn progress(&self) -> f64 {
        let done = self.steps.iter().filter(|s| s.is_complete()).count();
        done as f64 / self.steps.len() as f64
    }

    /// True iff every step at or after `from_index` is complete
    pub fn is_fully_done(&self, from_index: usize) -> bool {
        self.steps
            .iter()
            .skip(from_index)
            .all(|step| step.is_complete())
    }

    /// Whether the current step may be skipped right now
    pub fn can_skip(&self) -> bool {
        self.current_step()
            .map(|step| step.kind().is_skippable() && !self.recording.is_recording())
            .unwrap_or(false)
    }

    pub fn can_retry(&self) -> bool {
        !self.is_finished() && self.recording.attempt().can_retry()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move to the next step, or finish after the last one
    pub async fn advance(&mut self) -> Result<(), SessionError> {
        let index = self.active_index("advance")?;
        if index + 1 < self.steps.len() {
            self.enter_step(index + 1).await;
        } else {
            self.finish().await;
        }
        Ok(())
    }

    /// Leave the current step incomplete and advance
    pub async fn skip(&mut self, step_index: usize) -> Result<(), SessionError> {
        let index = self.active_index("skip")?;
        self.check_range(step_index)?;

        if step_index != index {
            return Err(SessionError::invalid(
                "skip",
                format!("step {} is not the current step ({})", step_index, index),
            ));
        }
        if !self.steps[index].kind().is_skippable() {
            return Err(SessionError::invalid(
                "skip",
                format!("{} steps cannot be skipped", self.steps[index].kind().tag()),
            ));
        }
        if self.recording.is_recording() {
            warn!("Skip rejected: recording in progress on step {}", index);
            return Err(SessionError::invalid("skip", "a recording is in progress"));
        }

        if self.breathing.stop() {
            info!("Breathing exercise abandoned by skip");
        }

        info!("Step {} skipped", index);
        self.events.push(SessionEvent::StepSkipped { index });
        self.advance().await
    }

    /// Move the cursor back to an earlier step, keeping completions
    ///
    /// Also reopens a finished session at `step_index`.
    pub async fn rewind(&mut self, step_index: usize) -> Result<(), SessionError> {
        self.check_range(step_index)?;
        if let SessionState::Active(index) = self.state {
            if step_index >= index {
                return Err(SessionError::invalid(
                    "rewind",
                    format!("step {} is not before the current step ({})", step_index, index),
                ));
            }
        }

        info!("Rewinding session to step {}", step_index);
        self.enter_step(step_index).await;
        Ok(())
    }

    /// Return to the first step with all progress cleared
    pub async fn restart(&mut self) {
        info!("Restarting session {}", self.session_id);
        for (step, original) in self.steps.iter_mut().zip(&self.plan) {
            step.clear(original);
        }
        self.enter_step(0).await;
    }

    /// End the session now
    pub async fn dismiss(&mut self) {
        if !self.is_finished() {
            info!("Session {} dismissed", self.session_id);
            self.finish().await;
        }
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Mark a step complete once its kind's criteria are met. Idempotent.
    pub fn mark_complete(&mut self, step_index: usize) -> Result<(), SessionError> {
        self.check_range(step_index)?;
        let step = &mut self.steps[step_index];

        if !step.is_eligible() && !step.is_complete() {
            return Err(SessionError::NotEligible {
                index: step_index,
                kind: step.kind().tag(),
            });
        }

        if step.mark_complete() {
            info!("Step {} complete", step_index);
            self.events.push(SessionEvent::StepCompleted { index: step_index });
        }
        Ok(())
    }

    /// Complete the current step and move on, if it is eligible
    pub async fn complete_current_step(&mut self) -> Result<(), SessionError> {
        let index = self.active_index("complete step")?;
        self.mark_complete(index)?;
        self.finish_step(index).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording steps
    // ------------------------------------------------------------------

    pub async fn begin_recording(&mut self) -> Result<(), SessionError> {
        let index = self.recorded_step("begin recording")?;
        let budget = self.budget_for(self.steps[index].kind());

        let result = self.recording.begin_recording(budget).await;
        self.collect_recording_events(index);
        result
    }

    /// Stop the take early. Returns false if nothing was recording.
    pub async fn stop_recording(&mut self) -> Result<bool, SessionError> {
        let index = self.active_index("stop recording")?;
        let stopped = self.recording.stop_recording(StopReason::Manual).await;
        self.collect_recording_events(index);
        Ok(stopped)
    }

    /// Discard the pending take. Returns false when no retry was possible.
    pub async fn retry_recording(&mut self) -> Result<bool, SessionError> {
        let index = self.active_index("retry recording")?;
        let retried = self.recording.retry().await;
        self.collect_recording_events(index);
        Ok(retried)
    }

    /// Accept the pending take, hand it off, complete the step and move on
    ///
    /// The handoff runs in the background; its outcome never holds up or
    /// reverses the session.
    pub async fn complete_and_save(&mut self) -> Result<SaveOutcome, SessionError> {
        let index = self.recorded_step("save recording")?;
        let kind = self.steps[index].kind();
        let step_kind = kind.tag().to_string();
        let prompt_text = kind.prompt().unwrap_or_default().to_string();

        let handoff = &self.handoff;
        let mut dispatched = None;
        let outcome = self.recording.complete_and_save(|artifact| {
            let key = handoff.dispatch(PersistRequest {
                key: Uuid::new_v4(),
                step_index: index,
                step_kind,
                prompt_text,
                artifact,
                requested_at: Utc::now(),
            });
            dispatched = Some(key);
        })?;

        self.collect_recording_events(index);
        if let Some(key) = dispatched {
            self.events.push(SessionEvent::HandoffDispatched { index, key });
        }

        self.steps[index].set_eligible();
        self.mark_complete(index)?;
        self.finish_step(index).await;

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Breathing steps
    // ------------------------------------------------------------------

    pub fn start_breathing(&mut self) -> Result<(), SessionError> {
        let index = self.active_index("start breathing")?;
        if self.steps[index].kind() != &StepKind::Breathing {
            return Err(SessionError::invalid(
                "start breathing",
                format!("step {} is a {} step", index, self.steps[index].kind().tag()),
            ));
        }

        let event = self.breathing.start()?;
        self.events.push(SessionEvent::Breathing { index, event });
        Ok(())
    }

    /// Abandon the exercise without leaving the step
    pub fn stop_breathing(&mut self) -> Result<bool, SessionError> {
        self.active_index("stop breathing")?;
        Ok(self.breathing.stop())
    }

    // ------------------------------------------------------------------
    // Sleep check-in
    // ------------------------------------------------------------------

    /// Commit the hours-slept value, forward it, and complete the step
    ///
    /// Any value is accepted.
    pub async fn commit_sleep_hours(&mut self, hours: f64) -> Result<(), SessionError> {
        let index = self.active_index("commit sleep hours")?;
        if !matches!(self.steps[index].kind(), StepKind::SleepCheckIn { .. }) {
            return Err(SessionError::invalid(
                "commit sleep hours",
                format!("step {} is a {} step", index, self.steps[index].kind().tag()),
            ));
        }

        info!("Sleep check-in committed: {} hours", hours);
        let step = &mut self.steps[index];
        step.set_hours_slept(hours);
        step.set_eligible();

        self.handoff.dispatch_sleep(index, hours);
        self.events.push(SessionEvent::SleepCommitted { index, hours });

        self.mark_complete(index)?;
        self.finish_step(index).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Drive the active countdowns and return every event since the last poll
    pub async fn poll(&mut self) -> Vec<SessionEvent> {
        if let SessionState::Active(index) = self.state {
            self.recording.poll().await;
            self.collect_recording_events(index);

            for event in self.breathing.poll() {
                if let BreathingEvent::Completed { .. } = event {
                    self.steps[index].set_eligible();
                }
                self.events.push(SessionEvent::Breathing { index, event });
            }
        }

        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let attempt = self.recording.attempt();
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            duration_secs: Utc::now()
                .signed_duration_since(self.started_at)
                .num_milliseconds() as f64
                / 1000.0,
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| StepStatus {
                    index,
                    kind: step.kind().tag().to_string(),
                    prompt: step.kind().prompt().map(str::to_string),
                    complete: step.is_complete(),
                })
                .collect(),
            progress: self.progress(),
            attempt: attempt.state,
            remaining_secs: attempt.remaining_secs,
            retries_remaining: attempt.retries_remaining,
            breathing: self.breathing.state(),
            breathing_phase: self.breathing.phase(),
            breathing_cycles_completed: self.breathing.cycles_completed(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn active_index(&self, operation: &'static str) -> Result<usize, SessionError> {
        self.current_index()
            .ok_or_else(|| SessionError::invalid(operation, "session is finished"))
    }

    fn recorded_step(&self, operation: &'static str) -> Result<usize, SessionError> {
        let index = self.active_index(operation)?;
        let kind = self.steps[index].kind();
        if !kind.is_recorded() {
            return Err(SessionError::invalid(
                operation,
                format!("step {} is a {} step", index, kind.tag()),
            ));
        }
        Ok(index)
    }

    fn check_range(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.steps.len() {
            return Err(SessionError::StepOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        Ok(())
    }

    fn budget_for(&self, kind: &StepKind) -> u32 {
        kind.budget_override().unwrap_or(match kind {
            StepKind::Affirmation { .. } => self.config.affirmation_budget_secs,
            _ => self.config.recording_budget_secs,
        })
    }

    fn collect_recording_events(&mut self, index: usize) {
        for event in self.recording.drain_events() {
            self.events.push(SessionEvent::Recording { index, event });
        }
    }

    /// Leave the finished step: dismiss if everything after it is done
    async fn finish_step(&mut self, index: usize) {
        if self.is_fully_done(index + 1) {
            self.finish().await;
        } else {
            self.enter_step(index + 1).await;
        }
    }

    async fn teardown_step(&mut self) {
        if self.recording.attempt().state != AttemptState::Idle {
            info!("Releasing recording attempt ({:?})", self.recording.attempt().state);
        }
        self.recording.release().await;
        if self.breathing.state() != BreathingState::NotStarted {
            self.breathing.reset();
        }
    }

    async fn enter_step(&mut self, index: usize) {
        self.teardown_step().await;
        self.state = SessionState::Active(index);

        let kind = self.steps[index].kind().tag();
        info!("Entering step {} ({})", index, kind);
        self.events.push(SessionEvent::StepEntered { index, kind });
    }

    async fn finish(&mut self) {
        self.teardown_step().await;
        self.state = SessionState::Finished;
        info!(
            "Session {} finished: {}/{} steps complete",
            self.session_id,
            self.steps.iter().filter(|s| s.is_complete()).count(),
            self.steps.len()
        );
        self.events.push(SessionEvent::Finished);
    }
}
