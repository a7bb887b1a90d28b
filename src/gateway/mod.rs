//! # Gateway Module
//!
//! The boundary between the client and the archive backend.
//!
//! ## Backends
//! - `ScriptedGateway` - plays back recorded batches in-process (tests,
//!   `archive-progress replay`)
//!
//! The real backend lives behind the same [`TaskGateway`] trait; how it
//! moves batches over the wire is its own business.

mod scripted;
mod traits;

pub use scripted::{ScriptedGateway, TaskScript};
pub use traits::{BatchHandler, SubscriptionHandle, TaskGateway};
