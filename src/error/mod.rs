//! # Error Module
//!
//! Error types for the archive client.
//!
//! ## Taxonomy
//! - **Item errors** are not errors here: they arrive as `Errored` task
//!   events and are counted like any other outcome
//! - **Transport errors** (`SubscriptionError`) are reported out of band
//!   and never reset accumulated progress
//! - **Protocol violations** (e.g. a shrinking scan count) are clamped and
//!   logged, never returned

use crate::events::TaskId;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ArchiveClientError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read task script {path}: {reason}")]
    Script { path: PathBuf, reason: String },
}

/// Errors returned by the backend gateway for request/response calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unknown source: {id}")]
    UnknownSource { id: String },

    #[error("Unknown task: {task_id}")]
    UnknownTask { task_id: TaskId },

    #[error("Request rejected by backend: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Transport-level failures of a task event subscription.
///
/// These are distinct from `Errored` task events, which describe a single
/// item the backend could not archive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Could not subscribe to events of task {task_id}: {source}")]
    Subscribe {
        task_id: TaskId,
        #[source]
        source: GatewayError,
    },

    #[error("Event channel for task {task_id} closed before the task completed")]
    ChannelClosed { task_id: TaskId },

    #[error("Event delivery for task {task_id} failed: {reason}")]
    Transport { task_id: TaskId, reason: String },
}

/// Errors raised when launching a task from the client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("A task is already running; wait for it to complete")]
    TaskInProgress,

    #[error("Source {id} is disconnected")]
    SourceUnavailable { id: String },

    #[error("Source {id} is not registered; import it first")]
    NotRegistered { id: String },

    #[error("Source {id} is already registered; synchronize it instead")]
    AlreadyRegistered { id: String },

    #[error("Invalid import request: {0}")]
    InvalidImport(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

/// Errors loading or storing the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,

    #[error("Could not determine the user data directory")]
    NoDataDir,

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid TOML: {reason}. Fix or delete it and try again.")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ArchiveClientError>;
