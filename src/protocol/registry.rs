//! Registry of simulation runs.
//!
//! Tracks runs by id with a caller-managed lifecycle. The registry stores
//! statuses and finished results only; every run owns its orchestrator and
//! key pair, and neither ever enters the registry.

use crate::protocol::result::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use uuid::Uuid;

/// Identifier of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed { result: Box<ProtocolResult> },
    Failed { error: String },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: RunId,
    pub label: String,
    pub status: RunStatus,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Shared map of runs.
///
/// Cloning is cheap and every clone sees the same runs.
#[derive(Debug, Clone, Default)]
pub struct SimulationRegistry {
    runs: Arc<RwLock<HashMap<RunId, RunRecord>>>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending run and return its id.
    pub fn register(&self, label: impl Into<String>) -> RunId {
        let id = RunId::new();
        let now = SystemTime::now();
        let record = RunRecord {
            id,
            label: label.into(),
            status: RunStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);
        id
    }

    /// Replace the status of a run that is not yet finished.
    ///
    /// Returns `false` for unknown or already finished runs.
    fn transition(&self, id: RunId, status: RunStatus) -> bool {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        match runs.get_mut(&id) {
            Some(record) if !record.status.is_finished() => {
                record.status = status;
                record.updated_at = SystemTime::now();
                true
            }
            _ => false,
        }
    }

    pub fn mark_running(&self, id: RunId) -> bool {
        self.transition(id, RunStatus::Running)
    }

    pub fn complete(&self, id: RunId, result: ProtocolResult) -> bool {
        self.transition(
            id,
            RunStatus::Completed {
                result: Box::new(result),
            },
        )
    }

    pub fn fail(&self, id: RunId, error: impl fmt::Display) -> bool {
        self.transition(
            id,
            RunStatus::Failed {
                error: error.to_string(),
            },
        )
    }

    pub fn get(&self, id: RunId) -> Option<RunRecord> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn remove(&self, id: RunId) -> Option<RunRecord> {
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
