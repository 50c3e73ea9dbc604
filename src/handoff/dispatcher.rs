use super::protocol::{
    AnalysisService, HandoffError, HandoffOutcome, JournalStore, PersistRequest, PersistedEntry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_BACKOFF_MS: u64 = 30_000;

/// Persist retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Total persist attempts per take, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub backoff_ms: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl HandoffConfig {
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << (attempt.saturating_sub(1)).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

/// Fire-and-forget submission of saved takes to the journal and analysis
///
/// `dispatch` returns as soon as the work is spawned. Each handoff runs on
/// its own task and reports a single `HandoffOutcome` through the paired
/// [`HandoffMonitor`]; nothing it does feeds back into session flow.
#[derive(Clone)]
pub struct HandoffDispatcher {
    store: Arc<dyn JournalStore>,
    analysis: Arc<dyn AnalysisService>,
    config: HandoffConfig,
    outcomes: mpsc::UnboundedSender<HandoffOutcome>,
}

impl HandoffDispatcher {
    pub fn new(
        store: Arc<dyn JournalStore>,
        analysis: Arc<dyn AnalysisService>,
        config: HandoffConfig,
    ) -> (Self, HandoffMonitor) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            store,
            analysis,
            config,
            outcomes,
        };
        (dispatcher, HandoffMonitor { rx })
    }

    /// Spawn the persist-then-analyze handoff for a saved take
    pub fn dispatch(&self, request: PersistRequest) -> Uuid {
        let key = request.key;
        let step_index = request.step_index;
        let store = Arc::clone(&self.store);
        let analysis = Arc::clone(&self.analysis);
        let config = self.config.clone();
        let outcomes = self.outcomes.clone();

        info!(
            "Dispatching handoff {} for step {} ({})",
            key, step_index, request.step_kind
        );

        tokio::spawn(async move {
            let result = run_handoff(store.as_ref(), analysis.as_ref(), &config, &request).await;
            let outcome = HandoffOutcome {
                key,
                step_index,
                result: result.map(Some),
            };
            // A closed monitor just means nobody is listening
            let _ = outcomes.send(outcome);
        });

        key
    }

    /// Spawn the forwarding of a committed sleep check-in value
    pub fn dispatch_sleep(&self, step_index: usize, hours: f64) -> Uuid {
        let key = Uuid::new_v4();
        let store = Arc::clone(&self.store);
        let outcomes = self.outcomes.clone();

        tokio::spawn(async move {
            let result = store
                .record_sleep(step_index, hours)
                .await
                .map(|_| None)
                .map_err(|e| HandoffError::SleepFailed {
                    message: format!("{:#}", e),
                });
            let _ = outcomes.send(HandoffOutcome {
                key,
                step_index,
                result,
            });
        });

        key
    }
}

async fn run_handoff(
    store: &dyn JournalStore,
    analysis: &dyn AnalysisService,
    config: &HandoffConfig,
    request: &PersistRequest,
) -> Result<PersistedEntry, HandoffError> {
    let entry = persist_with_retry(store, config, request).await?;

    if entry.transcript.trim().is_empty() {
        info!("Entry {} has no transcript; skipping analysis", entry.entry_id);
        return Ok(entry);
    }

    analysis
        .analyze(&entry.transcript)
        .await
        .map_err(|e| HandoffError::AnalysisFailed {
            entry_id: entry.entry_id.clone(),
            message: format!("{:#}", e),
        })?;

    Ok(entry)
}

async fn persist_with_retry(
    store: &dyn JournalStore,
    config: &HandoffConfig,
    request: &PersistRequest,
) -> Result<PersistedEntry, HandoffError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match store.persist(request).await {
            Ok(entry) => {
                info!(
                    "Handoff {} persisted as entry {} (attempt {})",
                    request.key, entry.entry_id, attempt
                );
                return Ok(entry);
            }
            Err(e) if attempt < max_attempts => {
                let delay = config.delay_after(attempt);
                warn!(
                    "Persist attempt {}/{} for {} failed: {:#}; retrying in {:?}",
                    attempt, max_attempts, request.key, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(HandoffError::PersistFailed {
                    attempts: attempt,
                    message: format!("{:#}", e),
                });
            }
        }
    }
}

/// Counts of finished handoffs seen by a monitor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandoffTally {
    pub succeeded: usize,
    pub failed: usize,
}

/// Receiving side of the handoff outcome channel
pub struct HandoffMonitor {
    rx: mpsc::UnboundedReceiver<HandoffOutcome>,
}

impl HandoffMonitor {
    /// Wait for the next finished handoff
    ///
    /// Returns `None` once every dispatcher is dropped and all in-flight
    /// handoffs have reported.
    pub async fn next(&mut self) -> Option<HandoffOutcome> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<HandoffOutcome> {
        self.rx.try_recv().ok()
    }

    /// Log every outcome until the channel closes
    pub fn spawn_logger(mut self) -> JoinHandle<HandoffTally> {
        tokio::spawn(async move {
            let mut tally = HandoffTally::default();
            while let Some(outcome) = self.next().await {
                match &outcome.result {
                    Ok(_) => {
                        tally.succeeded += 1;
                        info!(
                            "Handoff {} for step {} succeeded",
                            outcome.key, outcome.step_index
                        );
                    }
                    Err(e) => {
                        tally.failed += 1;
                        error!(
                            "Handoff {} for step {} failed: {}",
                            outcome.key, outcome.step_index, e
                        );
                    }
                }
            }
            tally
        })
    }
}
