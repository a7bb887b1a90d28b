//! # Events Module
//!
//! Task events as the archive backend emits them, and the channel
//! used to move batches of them between threads.
//!
//! ## Design
//! The backend reports every task as a stream of batches. A batch is an
//! ordered `Vec<TaskEvent>`; batch size and cadence are up to the
//! transport.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = BatchChannel::new();
//!
//! std::thread::spawn(move || {
//!     sender.send(vec![TaskEvent::ScanProgress { count: 10 }]);
//!     sender.send(vec![TaskEvent::ScanComplete { count: 12 }, TaskEvent::Completed]);
//! });
//!
//! while let BatchWait::Batch(batch) = receiver.recv_timeout(Duration::from_secs(1)) {
//!     println!("{} events", batch.len());
//! }
//! ```

mod channel;
mod types;

pub use channel::{BatchChannel, BatchReceiver, BatchSender, BatchWait};
pub use types::*;
