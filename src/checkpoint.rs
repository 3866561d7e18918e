//! Checkpoint Store
//!
//! Full-state snapshots of a dispatch run, written after every item transition so an
//! interrupted run can resume. The document is versioned JSON; anything this build cannot
//! read is treated as "no checkpoint" instead of an error.

use crate::error::StorageError;
use crate::queue::{DispatchStats, WorkItem, WorkItemId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CHECKPOINT_FORMAT: &str = "adbatch-checkpoint";
pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of queue, in-flight, completed and failed items plus counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: DispatchStats,
    #[serde(default)]
    pub queue: Vec<WorkItem>,
    #[serde(default)]
    pub in_flight: Vec<WorkItem>,
    #[serde(default)]
    pub completed: Vec<WorkItem>,
    #[serde(default)]
    pub failed: Vec<WorkItem>,
}

impl Checkpoint {
    pub fn new(
        revision: u64,
        stats: DispatchStats,
        queue: Vec<WorkItem>,
        in_flight: Vec<WorkItem>,
        completed: Vec<WorkItem>,
        failed: Vec<WorkItem>,
    ) -> Self {
        Self {
            format: CHECKPOINT_FORMAT.to_string(),
            version: CHECKPOINT_VERSION,
            revision,
            saved_at: Utc::now(),
            stats,
            queue,
            in_flight,
            completed,
            failed,
        }
    }

    pub fn item_count(&self) -> usize {
        self.queue.len() + self.in_flight.len() + self.completed.len() + self.failed.len()
    }

    /// Every item id, collection by collection.
    pub fn ids(&self) -> impl Iterator<Item = &WorkItemId> {
        self.queue
            .iter()
            .chain(&self.in_flight)
            .chain(&self.completed)
            .chain(&self.failed)
            .map(|item| &item.id)
    }

    /// Parse a document, rejecting foreign or newer formats.
    pub fn from_json(text: &str) -> Result<Self, StorageError> {
        let value: Value = serde_json::from_str(text)?;
        let format = value.get("format").and_then(Value::as_str).unwrap_or("");
        if format != CHECKPOINT_FORMAT {
            return Err(StorageError::IncompatibleCheckpoint(format!(
                "not an adbatch checkpoint (format '{}')",
                format
            )));
        }
        let version = value.get("version").and_then(Value::as_u64).unwrap_or(0);
        if version == 0 || version > u64::from(CHECKPOINT_VERSION) {
            return Err(StorageError::IncompatibleCheckpoint(format!(
                "unsupported checkpoint version {} (supported: {})",
                version, CHECKPOINT_VERSION
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// One checkpoint file. Writes are serialized and never go backwards in revision.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    last_revision: Mutex<Option<u64>>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_revision: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Overwrite the checkpoint. Returns false when a newer revision was already written.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<bool, StorageError> {
        let mut last = self.last_revision.lock();
        if let Some(last) = *last {
            if checkpoint.revision <= last {
                debug!(
                    revision = checkpoint.revision,
                    last_revision = last,
                    "Skipping stale checkpoint"
                );
                return Ok(false);
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        *last = Some(checkpoint.revision);
        debug!(
            path = %self.path.display(),
            revision = checkpoint.revision,
            items = checkpoint.item_count(),
            "Checkpoint saved"
        );
        Ok(true)
    }

    /// Read the checkpoint. Missing, corrupt or incompatible files yield `None`.
    pub fn load(&self) -> Option<Checkpoint> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read checkpoint, ignoring it");
                return None;
            }
        };
        match Checkpoint::from_json(&text) {
            Ok(checkpoint) => {
                *self.last_revision.lock() = Some(checkpoint.revision);
                Some(checkpoint)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unusable checkpoint");
                None
            }
        }
    }

    /// Strict read for inspection tools.
    pub fn read(path: &Path) -> Result<Checkpoint, StorageError> {
        let text = std::fs::read_to_string(path)?;
        Checkpoint::from_json(&text)
    }

    pub fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Checkpoint removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
