//! Event type definitions for running archive tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier of a backend task, as handed out by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an identifier received from the backend.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier for a synchronization of a registered source.
    pub fn new_sync() -> Self {
        Self(format!("sync-source-{}", Uuid::new_v4()))
    }

    /// Generate a fresh identifier for the import of a new source.
    pub fn new_import() -> Self {
        Self(format!("import-source-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One fact emitted by the backend about a running task.
///
/// Scan counts are absolute snapshots, not deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "kebab-case")]
pub enum TaskEvent {
    /// The task has finished
    Completed,
    /// An item was written to the archive
    Stored {
        #[serde(rename = "src")]
        source_path: PathBuf,
        #[serde(rename = "dst")]
        dest_path: PathBuf,
        /// True for a derived artifact rather than a direct copy
        generated: bool,
    },
    /// The item was already archived, nothing written
    Skipped {
        #[serde(rename = "src")]
        source_path: PathBuf,
        #[serde(rename = "existing")]
        existing_path: PathBuf,
    },
    /// The item failed; `cause` is meant for humans
    Errored {
        #[serde(rename = "src")]
        source_path: PathBuf,
        cause: String,
    },
    /// Enumeration has found `count` items so far
    ScanProgress { count: u64 },
    /// Enumeration finished with `count` items to process
    ScanComplete { count: u64 },
}

/// Coarse classification used by the progress reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Processing,
    Scan,
    Terminal,
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::Stored { .. } | TaskEvent::Skipped { .. } | TaskEvent::Errored { .. } => {
                EventKind::Processing
            }
            TaskEvent::ScanProgress { .. } | TaskEvent::ScanComplete { .. } => EventKind::Scan,
            TaskEvent::Completed => EventKind::Terminal,
        }
    }

    /// Item count carried by scan events
    pub fn scan_count(&self) -> Option<u64> {
        match self {
            TaskEvent::ScanProgress { count } | TaskEvent::ScanComplete { count } => Some(*count),
            _ => None,
        }
    }
}

/// Events delivered together by the gateway, in emission order.
pub type EventBatch = Vec<TaskEvent>;
