//! One-second resolution countdown
//!
//! The timer does not use internal threads. The owner calls `poll()` whenever
//! it wants to observe the clock. Tick k of a run fires once `start + k`
//! seconds have passed on the clock, measured from the exact start instant;
//! every tick due since the last observation is delivered, in order and
//! without gaps.
//!
//! ```text
//! start(3) ... poll() -> [Tick(2)] ... poll() -> [Tick(1), Tick(0), Completed]
//! ```

use super::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Something observed while polling a running countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; carries the new remaining value
    Tick { remaining: u32 },
    /// Remaining time reached zero. Emitted once per run, after `Tick { remaining: 0 }`.
    Completed,
}

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Run {
    remaining: u32,
    /// Clock instant of the last delivered tick, or of the start
    mark: Duration,
}

pub struct CountdownTimer {
    clock: Arc<dyn Clock>,
    run: Option<Run>,
    /// Clock instant at which the last run completed
    completed_at: Option<Duration>,
}

impl CountdownTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            run: None,
            completed_at: None,
        }
    }

    /// Begin counting down from `from_secs`, replacing any current run
    pub fn start(&mut self, from_secs: u32) {
        let now = self.clock.elapsed();
        self.start_anchored(from_secs, now);
    }

    /// Begin a run whose first second is counted from `anchor` instead of now
    ///
    /// Chained runs anchor at the previous run's completion instant so a
    /// catch-up poll replays them back to back without drift.
    pub(crate) fn start_anchored(&mut self, from_secs: u32, anchor: Duration) {
        if self.run.is_some() {
            debug!("Countdown restarted while running; previous run discarded");
        }
        self.completed_at = None;
        self.run = Some(Run {
            remaining: from_secs,
            mark: anchor,
        });
    }

    /// Stop the countdown. Nothing is emitted afterwards until the next `start`.
    pub fn cancel(&mut self) {
        self.run = None;
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Remaining seconds of the current run, if any
    pub fn remaining(&self) -> Option<u32> {
        self.run.map(|run| run.remaining)
    }

    /// Clock instant at which the most recent run reached zero
    pub(crate) fn completed_at(&self) -> Option<Duration> {
        self.completed_at
    }

    /// Deliver every tick elapsed since the last poll
    pub fn poll(&mut self) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        let Some(mut run) = self.run else {
            return events;
        };

        let now = self.clock.elapsed();

        if run.remaining == 0 {
            self.finish(run.mark, &mut events);
            return events;
        }

        while run.mark + TICK <= now {
            run.mark += TICK;
            run.remaining -= 1;
            events.push(TimerEvent::Tick {
                remaining: run.remaining,
            });

            if run.remaining == 0 {
                self.finish(run.mark, &mut events);
                return events;
            }
        }

        self.run = Some(run);
        events
    }

    fn finish(&mut self, at: Duration, events: &mut Vec<TimerEvent>) {
        self.run = None;
        self.completed_at = Some(at);
        events.push(TimerEvent::Completed);
    }
}
