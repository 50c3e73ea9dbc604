use super::pattern::{BreathPhase, BreathingPattern, BreathingPatternError};
use crate::error::SessionError;
use crate::timer::{Clock, CountdownTimer, TimerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathingState {
    NotStarted,
    Running,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathingEvent {
    /// A phase began; `cycle` is the zero-based cycle it belongs to
    PhaseStarted { phase: BreathPhase, cycle: u32 },
    PhaseTick { phase: BreathPhase, remaining: u32 },
    Completed { cycles: u32 },
}

/// Repeating four-phase breathing exercise
///
/// Phases advance only when the phase countdown reaches zero. The cycle
/// count increments on the wrap from the last phase back to the first, and
/// the exercise completes on the wrap that reaches the target instead of
/// starting another cycle.
pub struct BreathingController {
    pattern: BreathingPattern,
    target_cycles: u32,
    timer: CountdownTimer,
    state: BreathingState,
    phase_index: usize,
    seconds_remaining_in_phase: u32,
    cycles_completed: u32,
    phases_completed: u32,
}

impl BreathingController {
    pub fn new(
        clock: Arc<dyn Clock>,
        pattern: BreathingPattern,
        target_cycles: u32,
    ) -> Result<Self, BreathingPatternError> {
        pattern.validate()?;
        if target_cycles == 0 {
            return Err(BreathingPatternError::NoCycles);
        }

        Ok(Self {
            pattern,
            target_cycles,
            timer: CountdownTimer::new(clock),
            state: BreathingState::NotStarted,
            phase_index: 0,
            seconds_remaining_in_phase: pattern.duration(BreathPhase::Inhale),
            cycles_completed: 0,
            phases_completed: 0,
        })
    }

    pub fn state(&self) -> BreathingState {
        self.state
    }

    pub fn phase(&self) -> BreathPhase {
        BreathPhase::from_index(self.phase_index)
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    pub fn seconds_remaining_in_phase(&self) -> u32 {
        self.seconds_remaining_in_phase
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    /// Total phase completions since `start`
    pub fn phases_completed(&self) -> u32 {
        self.phases_completed
    }

    pub fn target_cycles(&self) -> u32 {
        self.target_cycles
    }

    pub fn pattern(&self) -> &BreathingPattern {
        &self.pattern
    }

    pub fn start(&mut self) -> Result<BreathingEvent, SessionError> {
        if self.state != BreathingState::NotStarted {
            return Err(SessionError::invalid(
                "start breathing",
                format!("exercise is {:?}", self.state),
            ));
        }

        info!(
            "Breathing exercise started: {} cycles of {}s",
            self.target_cycles,
            self.pattern.cycle_secs()
        );

        self.state = BreathingState::Running;
        self.phase_index = 0;
        self.cycles_completed = 0;
        self.phases_completed = 0;
        self.seconds_remaining_in_phase = self.pattern.duration(BreathPhase::Inhale);
        self.timer.start(self.seconds_remaining_in_phase);

        Ok(BreathingEvent::PhaseStarted {
            phase: BreathPhase::Inhale,
            cycle: 0,
        })
    }

    /// Abandon a running exercise. Returns whether anything was stopped.
    pub fn stop(&mut self) -> bool {
        if self.state != BreathingState::Running {
            return false;
        }
        info!(
            "Breathing exercise stopped after {} cycles",
            self.cycles_completed
        );
        self.reset();
        true
    }

    /// Return to `NotStarted` from any state
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.state = BreathingState::NotStarted;
        self.phase_index = 0;
        self.seconds_remaining_in_phase = self.pattern.duration(BreathPhase::Inhale);
        self.cycles_completed = 0;
        self.phases_completed = 0;
    }

    /// Drive the phase countdown, replaying any seconds elapsed since the last poll
    pub fn poll(&mut self) -> Vec<BreathingEvent> {
        let mut events = Vec::new();

        while self.state == BreathingState::Running {
            let ticks = self.timer.poll();
            if ticks.is_empty() {
                break;
            }

            let mut phase_finished = false;
            for tick in ticks {
                match tick {
                    TimerEvent::Tick { remaining } => {
                        self.seconds_remaining_in_phase = remaining;
                        events.push(BreathingEvent::PhaseTick {
                            phase: self.phase(),
                            remaining,
                        });
                    }
                    TimerEvent::Completed => phase_finished = true,
                }
            }

            if !phase_finished {
                break;
            }

            self.phases_completed += 1;
            self.phase_index = (self.phase_index + 1) % BreathPhase::ALL.len();

            if self.phase_index == 0 {
                self.cycles_completed += 1;
                debug!("Breathing cycle {} complete", self.cycles_completed);

                if self.cycles_completed >= self.target_cycles {
                    self.timer.cancel();
                    self.state = BreathingState::Complete;
                    self.seconds_remaining_in_phase = 0;
                    info!(
                        "Breathing exercise complete: {} cycles",
                        self.cycles_completed
                    );
                    events.push(BreathingEvent::Completed {
                        cycles: self.cycles_completed,
                    });
                    break;
                }
            }

            let phase = self.phase();
            let anchor = self.timer.completed_at().unwrap_or_default();
            self.seconds_remaining_in_phase = self.pattern.duration(phase);
            self.timer
                .start_anchored(self.seconds_remaining_in_phase, anchor);
            events.push(BreathingEvent::PhaseStarted {
                phase,
                cycle: self.cycles_completed,
            });
        }

        events
    }
}
