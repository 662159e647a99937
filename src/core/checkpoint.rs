// src/core/checkpoint.rs — Per-run resumption points

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::types::{Stage, WorkflowState};
use crate::infra::errors::ConsultError;

/// Latest state of a run and the stage to execute next.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub state: WorkflowState,
    pub next: Stage,
    pub updated_at: DateTime<Utc>,
}

/// Storage for checkpoints keyed by correlation id.
pub trait Checkpointer: Send + Sync {
    fn save(&self, correlation_id: &str, checkpoint: Checkpoint) -> Result<(), ConsultError>;
    fn load(&self, correlation_id: &str) -> Result<Option<Checkpoint>, ConsultError>;
    fn remove(&self, correlation_id: &str) -> Result<(), ConsultError>;
}

pub const DEFAULT_MAX_CHECKPOINTS: usize = 256;
pub const DEFAULT_CHECKPOINT_TTL_SECS: u64 = 3600;

/// Process-local checkpoint store. Contents do not survive a restart.
///
/// Failed or abandoned runs leave their checkpoint behind for `resume`.
/// Entries older than the TTL are pruned on every save, and when the store
/// is full the least recently updated entry is evicted.
pub struct MemoryCheckpointer {
    entries: Mutex<HashMap<String, Checkpoint>>,
    max_entries: usize,
    ttl: Duration,
}

impl Default for MemoryCheckpointer {
    fn default() -> Self {
        Self::with_retention(DEFAULT_MAX_CHECKPOINTS, DEFAULT_CHECKPOINT_TTL_SECS)
    }
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(max_entries: usize, ttl_secs: u64) -> Self {
        let ttl_secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl: Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> ConsultError {
    ConsultError::Other(anyhow::anyhow!("checkpoint store lock poisoned"))
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, correlation_id: &str, checkpoint: Checkpoint) -> Result<(), ConsultError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        prune(&mut entries, correlation_id, self.max_entries, self.ttl, Utc::now());
        entries.insert(correlation_id.to_string(), checkpoint);
        Ok(())
    }

    fn load(&self, correlation_id: &str) -> Result<Option<Checkpoint>, ConsultError> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(correlation_id).cloned())
    }

    fn remove(&self, correlation_id: &str) -> Result<(), ConsultError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.remove(correlation_id);
        Ok(())
    }
}

/// Drop expired entries, then make room for `incoming` if it is a new key.
fn prune(
    entries: &mut HashMap<String, Checkpoint>,
    incoming: &str,
    max_entries: usize,
    ttl: Duration,
    now: DateTime<Utc>,
) {
    let before = entries.len();
    entries.retain(|_, c| now.signed_duration_since(c.updated_at) <= ttl);
    let expired = before - entries.len();

    let mut evicted = 0;
    if !entries.contains_key(incoming) {
        while entries.len() >= max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, c)| c.updated_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            evicted += 1;
        }
    }
    if expired + evicted > 0 {
        tracing::debug!(expired, evicted, "Pruned checkpoints");
    }
}
