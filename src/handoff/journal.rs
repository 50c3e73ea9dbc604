use super::protocol::{AnalysisService, JournalStore, PersistRequest, PersistedEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One line of the journal file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalLine {
    Entry {
        entry_id: String,
        key: Uuid,
        step_index: usize,
        step_kind: String,
        prompt_text: String,
        artifact_path: PathBuf,
        duration_secs: f64,
        recorded_at: DateTime<Utc>,
    },
    Sleep {
        step_index: usize,
        hours: f64,
        recorded_at: DateTime<Utc>,
    },
}

/// Append-only JSON Lines journal on local disk
///
/// Entries are deduplicated by handoff key, so a retried persist returns the
/// entry written by the first successful attempt. Keys already in the file
/// are loaded on first use, which extends this across process restarts.
/// Transcripts are always empty; transcription happens elsewhere.
pub struct JsonlJournal {
    path: PathBuf,
    /// Key to entry id, filled from disk on the first persist
    persisted: Mutex<Option<HashMap<Uuid, String>>>,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            persisted: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn append(&self, line: &JournalLine) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create journal directory")?;
            }
        }

        let mut json = serde_json::to_vec(line)?;
        json.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;
        file.write_all(&json)
            .await
            .context("Failed to append journal line")?;
        file.flush().await?;
        Ok(())
    }

    async fn load_keys(&self) -> Result<HashMap<Uuid, String>> {
        let keys: HashMap<Uuid, String> = self
            .read_all()
            .await?
            .into_iter()
            .filter_map(|line| match line {
                JournalLine::Entry { key, entry_id, .. } => Some((key, entry_id)),
                JournalLine::Sleep { .. } => None,
            })
            .collect();
        debug!("Loaded {} journal keys from {}", keys.len(), self.path.display());
        Ok(keys)
    }

    /// Read every line back, oldest first
    pub async fn read_all(&self) -> Result<Vec<JournalLine>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read journal"),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed journal line"))
            .collect()
    }
}

#[async_trait::async_trait]
impl JournalStore for JsonlJournal {
    async fn persist(&self, request: &PersistRequest) -> Result<PersistedEntry> {
        let mut guard = self.persisted.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_keys().await?);
        }
        let persisted = guard.get_or_insert_with(HashMap::new);

        if let Some(entry_id) = persisted.get(&request.key) {
            return Ok(PersistedEntry {
                entry_id: entry_id.clone(),
                transcript: String::new(),
            });
        }

        let entry_id = format!("entry-{}", Uuid::new_v4());
        self.append(&JournalLine::Entry {
            entry_id: entry_id.clone(),
            key: request.key,
            step_index: request.step_index,
            step_kind: request.step_kind.clone(),
            prompt_text: request.prompt_text.clone(),
            artifact_path: request.artifact.path.clone(),
            duration_secs: request.artifact.duration.as_secs_f64(),
            recorded_at: Utc::now(),
        })
        .await?;

        info!("Journal entry {} written to {}", entry_id, self.path.display());
        persisted.insert(request.key, entry_id.clone());

        Ok(PersistedEntry {
            entry_id,
            transcript: String::new(),
        })
    }

    async fn record_sleep(&self, step_index: usize, hours: f64) -> Result<()> {
        self.append(&JournalLine::Sleep {
            step_index,
            hours,
            recorded_at: Utc::now(),
        })
        .await
    }
}

/// Analysis stand-in that only logs what it was given
#[derive(Debug, Default, Clone)]
pub struct LogAnalysis;

#[async_trait::async_trait]
impl AnalysisService for LogAnalysis {
    async fn analyze(&self, transcript: &str) -> Result<()> {
        info!(
            "Analysis requested for transcript ({} words)",
            transcript.split_whitespace().count()
        );
        Ok(())
    }
}
