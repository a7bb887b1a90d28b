//! # Core Module
//!
//! Client-side logic, independent of any GUI toolkit or transport.
//!
//! ## Modules
//! - `progress` - Folds task event batches into progress snapshots
//! - `driver` - Follows a task's event subscription and publishes snapshots
//! - `sources` - Archive sources and import requests
//! - `client` - Starts sync/import tasks and tracks them

pub mod client;
pub mod driver;
pub mod progress;
pub mod sources;

// Re-export commonly used types
pub use client::ArchiveClient;
pub use driver::{ProgressUpdate, SnapshotStream, TaskProgressDriver};
pub use progress::{apply_batch, OutcomeCounters, OutcomeLabel, ProgressSnapshot, TaskProgress};
pub use sources::{ArchiveSource, ImportRequest, SourceAction};
