// Shared fakes for integration tests
//
// Each fake records what the session asked of it so tests can assert on
// device usage and handoff traffic without real audio or storage.

#![allow(dead_code)]

use anyhow::Result;
use reflection_session::{
    AnalysisService, ArtifactHandle, AudioCapture, Clock, HandoffConfig, HandoffDispatcher,
    HandoffMonitor, JournalStore, ManualClock, PersistRequest, PersistedEntry, SessionConfig,
    SessionController, StepKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Observable state of a [`FakeCapture`]
#[derive(Debug, Default)]
pub struct CaptureProbe {
    pub calls: Vec<&'static str>,
    /// A take is being captured right now
    pub holding: bool,
    /// Times a take was prepared or started while another was held
    pub violations: usize,
    pub fail_prepare: bool,
    pub fail_start: bool,
    pub no_artifact: bool,
    pub takes: u32,
}

impl CaptureProbe {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

pub struct FakeCapture {
    probe: Arc<Mutex<CaptureProbe>>,
    artifact: Option<ArtifactHandle>,
}

impl FakeCapture {
    pub fn new() -> (Self, Arc<Mutex<CaptureProbe>>) {
        let probe = Arc::new(Mutex::new(CaptureProbe::default()));
        let capture = Self {
            probe: Arc::clone(&probe),
            artifact: None,
        };
        (capture, probe)
    }
}

#[async_trait::async_trait]
impl AudioCapture for FakeCapture {
    async fn prepare_for_new_recording(&mut self) -> Result<()> {
        let mut probe = self.probe.lock().unwrap();
        probe.calls.push("prepare");
        if probe.fail_prepare {
            anyhow::bail!("microphone permission denied");
        }
        if probe.holding {
            probe.violations += 1;
        }
        self.artifact = None;
        Ok(())
    }

    async fn start_recording(&mut self) -> Result<()> {
        let mut probe = self.probe.lock().unwrap();
        probe.calls.push("start");
        if probe.fail_start {
            anyhow::bail!("device busy");
        }
        if probe.holding {
            probe.violations += 1;
        }
        probe.holding = true;
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        let mut probe = self.probe.lock().unwrap();
        probe.calls.push("stop");
        if probe.holding {
            probe.holding = false;
            probe.takes += 1;
            if !probe.no_artifact {
                self.artifact = Some(ArtifactHandle::new(
                    format!("/tmp/fake-take-{}.wav", probe.takes),
                    Duration::from_secs(5),
                ));
            }
        }
        Ok(())
    }

    fn current_artifact(&self) -> Option<ArtifactHandle> {
        self.artifact.clone()
    }

    async fn reset(&mut self) -> Result<()> {
        let mut probe = self.probe.lock().unwrap();
        probe.calls.push("reset");
        probe.holding = false;
        self.artifact = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Journal that remembers every request; can fail the first N persists
#[derive(Default)]
pub struct MemoryJournal {
    pub requests: Mutex<Vec<PersistRequest>>,
    pub sleeps: Mutex<Vec<(usize, f64)>>,
    pub transcript: String,
    pub failures_left: AtomicU32,
    pub fail_sleep: bool,
}

impl MemoryJournal {
    pub fn with_transcript(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            ..Default::default()
        }
    }

    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            ..Default::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl JournalStore for MemoryJournal {
    async fn persist(&self, request: &PersistRequest) -> Result<PersistedEntry> {
        self.requests.lock().unwrap().push(request.clone());

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("journal offline");
        }

        Ok(PersistedEntry {
            entry_id: format!("entry-{}", request.step_index),
            transcript: self.transcript.clone(),
        })
    }

    async fn record_sleep(&self, step_index: usize, hours: f64) -> Result<()> {
        if self.fail_sleep {
            anyhow::bail!("journal offline");
        }
        self.sleeps.lock().unwrap().push((step_index, hours));
        Ok(())
    }
}

/// Journal whose persist never resolves
pub struct HangingJournal;

#[async_trait::async_trait]
impl JournalStore for HangingJournal {
    async fn persist(&self, _request: &PersistRequest) -> Result<PersistedEntry> {
        std::future::pending().await
    }
}

/// Journal that holds each step's persist until the test opens its gate
#[derive(Default)]
pub struct GatedJournal {
    gates: Mutex<HashMap<usize, Arc<Notify>>>,
}

impl GatedJournal {
    pub fn gate(&self, step_index: usize) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .unwrap()
                .entry(step_index)
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }
}

#[async_trait::async_trait]
impl JournalStore for GatedJournal {
    async fn persist(&self, request: &PersistRequest) -> Result<PersistedEntry> {
        self.gate(request.step_index).notified().await;
        Ok(PersistedEntry {
            entry_id: format!("entry-{}", request.step_index),
            transcript: String::new(),
        })
    }
}

#[derive(Default)]
pub struct MemoryAnalysis {
    pub transcripts: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl AnalysisService for MemoryAnalysis {
    async fn analyze(&self, transcript: &str) -> Result<()> {
        if self.fail {
            anyhow::bail!("analysis backend down");
        }
        self.transcripts.lock().unwrap().push(transcript.to_string());
        Ok(())
    }
}

pub fn fast_handoff() -> HandoffConfig {
    HandoffConfig {
        max_attempts: 3,
        backoff_ms: 10,
    }
}

/// Everything a session test needs to observe
pub struct Harness {
    pub session: SessionController,
    pub clock: ManualClock,
    pub probe: Arc<Mutex<CaptureProbe>>,
    pub monitor: HandoffMonitor,
}

pub fn harness(
    plan: Vec<StepKind>,
    config: SessionConfig,
    store: Arc<dyn JournalStore>,
) -> Harness {
    let clock = ManualClock::new();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let (capture, probe) = FakeCapture::new();
    let (dispatcher, monitor) =
        HandoffDispatcher::new(store, Arc::new(MemoryAnalysis::default()), fast_handoff());

    let session = SessionController::new(plan, config, Box::new(capture), dispatcher, shared)
        .expect("valid session");

    Harness {
        session,
        clock,
        probe,
        monitor,
    }
}

pub fn recordings(count: usize) -> Vec<StepKind> {
    (0..count)
        .map(|i| StepKind::recording(format!("Prompt {}", i)))
        .collect()
}

pub fn config_with_budget(budget_secs: u32, retries: u32) -> SessionConfig {
    SessionConfig {
        recording_budget_secs: budget_secs,
        affirmation_budget_secs: budget_secs,
        retry_budget: retries,
        ..SessionConfig::default()
    }
}
