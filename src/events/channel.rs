//! Batch channel implementation using crossbeam-channel.
//!
//! Carries event batches from whatever produces them (a backend
//! worker, a recorded script) to the thread that delivers them to
//! subscribers.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::EventBatch;

/// Sends event batches.
///
/// A thin wrapper around crossbeam's Sender that can be cloned and
/// sent across threads.
#[derive(Clone)]
pub struct BatchSender {
    inner: Sender<EventBatch>,
}

impl BatchSender {
    /// Send a batch without blocking.
    ///
    /// Returns false once the receiving side is gone, so producers
    /// know they can stop.
    pub fn send(&self, batch: EventBatch) -> bool {
        self.inner.send(batch).is_ok()
    }
}

/// Outcome of waiting for a batch with a deadline.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchWait {
    Batch(EventBatch),
    Timeout,
    Disconnected,
}

/// Receives event batches in the order they were sent.
pub struct BatchReceiver {
    inner: Receiver<EventBatch>,
}

impl BatchReceiver {
    /// Wait up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: Duration) -> BatchWait {
        match self.inner.recv_timeout(timeout) {
            Ok(batch) => BatchWait::Batch(batch),
            Err(RecvTimeoutError::Timeout) => BatchWait::Timeout,
            Err(RecvTimeoutError::Disconnected) => BatchWait::Disconnected,
        }
    }
}

/// Channel connecting a batch producer with a delivery loop.
pub struct BatchChannel;

impl BatchChannel {
    /// Create a new unbounded batch channel.
    pub fn new() -> (BatchSender, BatchReceiver) {
        let (sender, receiver) = unbounded();
        (
            BatchSender { inner: sender },
            BatchReceiver { inner: receiver },
        )
    }
}
