//! # Photo Archive Client
//!
//! Client-side tracking of photo archive tasks.
//!
//! The backend imports and synchronizes storage sources; while it works it
//! reports batches of task events. This library turns those batches into
//! one consistent progress snapshot a UI can render directly.
//!
//! ## Architecture
//! - `core` - Progress reducer, subscription driver, sources and client
//! - `events` - Task events and batch channels
//! - `gateway` - Boundary to the backend
//! - `config` - Configuration file
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod gateway;

// Re-export commonly used types at the crate root
pub use error::{ArchiveClientError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Calling it a
/// second time leaves the first subscriber in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
