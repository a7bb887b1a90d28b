//! # Task Progress Driver
//!
//! Binds one task's event subscription to the progress reducer and
//! publishes every resulting snapshot to observers.
//!
//! ## Guarantees
//! - Snapshots are published in the order batches were applied, one per
//!   batch
//! - The current snapshot is replaced whole; readers see the value
//!   before or after a batch, never in between
//! - Once [`TaskProgressDriver::stop`] returns nothing more is published
//! - Transport failures are reported as [`ProgressUpdate::Failed`] and
//!   leave the snapshot as it was
//!
//! ## Example
//! ```rust,ignore
//! let driver = TaskProgressDriver::new(gateway.clone());
//! let task_id = gateway.start_sync("card")?;
//! let stream = driver.start(task_id)?;
//!
//! for update in stream.iter() {
//!     if let ProgressUpdate::Snapshot(snapshot) = update {
//!         println!("{snapshot}");
//!     }
//! }
//! ```

use crate::core::progress::{apply_batch, ProgressSnapshot};
use crate::error::SubscriptionError;
use crate::events::{EventBatch, TaskId};
use crate::gateway::{SubscriptionHandle, TaskGateway};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What observers of a task receive
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Snapshot after one more batch was applied
    Snapshot(ProgressSnapshot),
    /// The event subscription failed; `last` is the snapshot it left behind
    Failed {
        error: SubscriptionError,
        last: ProgressSnapshot,
    },
}

struct Published {
    snapshot: Arc<ProgressSnapshot>,
    cancelled: bool,
    failed: bool,
    observers: Vec<Sender<ProgressUpdate>>,
}

/// State shared between the driver, the subscription callback and the
/// streams handed to observers.
struct SharedProgress {
    task_id: TaskId,
    started_at: DateTime<Utc>,
    inner: Mutex<Published>,
}

impl SharedProgress {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            started_at: Utc::now(),
            inner: Mutex::new(Published {
                snapshot: Arc::new(ProgressSnapshot::scanning()),
                cancelled: false,
                failed: false,
                observers: Vec::new(),
            }),
        }
    }

    // The snapshot is only ever swapped for a complete new value, so a
    // poisoned lock still guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, Published> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> Arc<ProgressSnapshot> {
        self.lock().snapshot.clone()
    }

    /// Still receiving batches, whether or not anyone is observing.
    fn is_live(&self) -> bool {
        let published = self.lock();
        !published.cancelled && !published.failed
    }

    /// Register an observer; it first receives the current snapshot.
    fn observe(self: &Arc<Self>) -> SnapshotStream {
        let (sender, receiver) = unbounded();
        {
            let mut published = self.lock();
            let open = !published.cancelled
                && !published.failed
                && !published.snapshot.is_terminal();
            let _ = sender.send(ProgressUpdate::Snapshot((*published.snapshot).clone()));
            if open {
                published.observers.push(sender);
            }
        }
        SnapshotStream {
            receiver,
            shared: self.clone(),
        }
    }

    fn handle(&self, delivery: Result<EventBatch, SubscriptionError>) {
        let mut published = self.lock();
        if published.cancelled {
            debug!(task_id = %self.task_id, "Discarding delivery after stop");
            return;
        }

        match delivery {
            Ok(batch) => {
                let next = apply_batch(&published.snapshot, &batch);
                debug!(
                    task_id = %self.task_id,
                    events = batch.len(),
                    state = next.phase_name(),
                    processed = next.processed(),
                    total = next.total(),
                    "Applied batch"
                );

                let terminal = next.is_terminal() && !published.snapshot.is_terminal();
                published.snapshot = Arc::new(next);
                let update = ProgressUpdate::Snapshot((*published.snapshot).clone());
                broadcast(&mut published.observers, update);

                if terminal {
                    info!(task_id = %self.task_id, "{}", published.snapshot);
                    // Dropping the senders ends every observer's stream.
                    published.observers.clear();
                }
            }
            Err(error) => {
                warn!(task_id = %self.task_id, %error, "Task event subscription failed");
                published.failed = true;
                let update = ProgressUpdate::Failed {
                    error,
                    last: (*published.snapshot).clone(),
                };
                broadcast(&mut published.observers, update);
                published.observers.clear();
            }
        }
    }

    fn cancel(&self) {
        let mut published = self.lock();
        published.cancelled = true;
        published.observers.clear();
    }
}

fn broadcast(observers: &mut Vec<Sender<ProgressUpdate>>, update: ProgressUpdate) {
    observers.retain(|observer| observer.send(update.clone()).is_ok());
}

/// Read side of a task subscription.
///
/// Yields one [`ProgressUpdate`] per applied batch and ends after the
/// task completes, fails, or the driver is stopped.
pub struct SnapshotStream {
    receiver: Receiver<ProgressUpdate>,
    shared: Arc<SharedProgress>,
}

impl SnapshotStream {
    pub fn task_id(&self) -> &TaskId {
        &self.shared.task_id
    }

    /// When the driver attached to the task
    pub fn started_at(&self) -> DateTime<Utc> {
        self.shared.started_at
    }

    /// Latest snapshot, independent of what has been read from the stream
    pub fn current(&self) -> Arc<ProgressSnapshot> {
        self.shared.current()
    }

    /// Block until the next update; None once the stream has ended
    pub fn recv(&self) -> Option<ProgressUpdate> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressUpdate> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<ProgressUpdate> {
        self.receiver.try_recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProgressUpdate> + '_ {
        self.receiver.iter()
    }

    /// Another independent stream over the same task
    pub fn observe(&self) -> SnapshotStream {
        self.shared.observe()
    }
}

struct ActiveTask {
    handle: SubscriptionHandle,
    shared: Arc<SharedProgress>,
}

/// Drives the progress snapshot of one task at a time.
pub struct TaskProgressDriver<G: TaskGateway + ?Sized> {
    gateway: Arc<G>,
    active: Mutex<Option<ActiveTask>>,
}

impl<G: TaskGateway + ?Sized> TaskProgressDriver<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            active: Mutex::new(None),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveTask>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach to `task_id` and start folding its batches.
    ///
    /// The snapshot starts out `Scanning` with nothing counted, and the
    /// returned stream yields it first. A task attached before is
    /// stopped.
    pub fn start(&self, task_id: TaskId) -> Result<SnapshotStream, SubscriptionError> {
        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            self.detach(previous);
        }

        let shared = Arc::new(SharedProgress::new(task_id.clone()));
        let stream = shared.observe();

        let callback_shared = shared.clone();
        let handle = self
            .gateway
            .subscribe_task_events(
                &task_id,
                Box::new(move |delivery| callback_shared.handle(delivery)),
            )
            .map_err(|source| SubscriptionError::Subscribe {
                task_id: task_id.clone(),
                source,
            })?;

        info!(%task_id, "Tracking task progress");
        *active = Some(ActiveTask { handle, shared });
        Ok(stream)
    }

    /// Detach from the current task. No snapshot is published after this
    /// returns, even for a batch already in flight.
    pub fn stop(&self) {
        let previous = self.lock_active().take();
        if let Some(previous) = previous {
            self.detach(previous);
        }
    }

    fn detach(&self, task: ActiveTask) {
        task.shared.cancel();
        if let Err(error) = self.gateway.unsubscribe(&task.handle) {
            warn!(task_id = %task.handle.task_id(), %error, "Failed to unsubscribe");
        }
        debug!(task_id = %task.handle.task_id(), "Stopped tracking task");
    }

    /// Snapshot of the attached task, `Idle` when there is none.
    pub fn current(&self) -> ProgressSnapshot {
        self.lock_active()
            .as_ref()
            .map(|task| (*task.shared.current()).clone())
            .unwrap_or_default()
    }

    /// True while the attached task is scanning or running and its
    /// subscription is still delivering.
    pub fn is_busy(&self) -> bool {
        self.lock_active()
            .as_ref()
            .map(|task| task.shared.is_live() && task.shared.current().is_active())
            .unwrap_or(false)
    }

    /// New stream over the attached task, if any
    pub fn observe(&self) -> Option<SnapshotStream> {
        self.lock_active().as_ref().map(|task| task.shared.observe())
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.lock_active()
            .as_ref()
            .map(|task| task.shared.task_id.clone())
    }
}

impl<G: TaskGateway + ?Sized> Drop for TaskProgressDriver<G> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::{OutcomeLabel, TaskProgress};
    use crate::core::sources::{ArchiveSource, ImportRequest};
    use crate::error::GatewayError;
    use crate::events::TaskEvent;
    use crate::gateway::BatchHandler;
    use std::path::PathBuf;

    /// Gateway whose deliveries are pushed by the test itself
    #[derive(Default)]
    struct ManualGateway {
        handler: Mutex<Option<BatchHandler>>,
        unsubscribed: Mutex<bool>,
        refuse: bool,
    }

    impl ManualGateway {
        fn push(&self, delivery: Result<EventBatch, SubscriptionError>) {
            if *self.unsubscribed.lock().unwrap() {
                return;
            }
            if let Some(handler) = self.handler.lock().unwrap().as_mut() {
                handler(delivery);
            }
        }

        fn push_batch(&self, batch: EventBatch) {
            self.push(Ok(batch));
        }
    }

    impl TaskGateway for ManualGateway {
        fn list_sources(&self) -> Result<Vec<ArchiveSource>, GatewayError> {
            Ok(Vec::new())
        }

        fn list_groups(&self) -> Result<Vec<String>, GatewayError> {
            Ok(Vec::new())
        }

        fn start_sync(&self, _source_id: &str) -> Result<TaskId, GatewayError> {
            Ok(TaskId::new_sync())
        }

        fn start_import(&self, _request: &ImportRequest) -> Result<TaskId, GatewayError> {
            Ok(TaskId::new_import())
        }

        fn subscribe_task_events(
            &self,
            task_id: &TaskId,
            on_batch: BatchHandler,
        ) -> Result<SubscriptionHandle, GatewayError> {
            if self.refuse {
                return Err(GatewayError::Transport("offline".to_string()));
            }
            *self.handler.lock().unwrap() = Some(on_batch);
            *self.unsubscribed.lock().unwrap() = false;
            Ok(SubscriptionHandle::new(1, task_id.clone()))
        }

        fn unsubscribe(&self, _handle: &SubscriptionHandle) -> Result<(), GatewayError> {
            *self.unsubscribed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn stored() -> TaskEvent {
        TaskEvent::Stored {
            source_path: PathBuf::from("/src/a.jpg"),
            dest_path: PathBuf::from("/archive/a.jpg"),
            generated: false,
        }
    }

    fn snapshots(stream: &SnapshotStream) -> Vec<ProgressSnapshot> {
        std::iter::from_fn(|| stream.try_recv())
            .filter_map(|update| match update {
                ProgressUpdate::Snapshot(snapshot) => Some(snapshot),
                ProgressUpdate::Failed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn driver_starts_idle() {
        let driver = TaskProgressDriver::new(Arc::new(ManualGateway::default()));

        assert_eq!(driver.current(), ProgressSnapshot::Idle);
        assert!(!driver.is_busy());
        assert!(driver.observe().is_none());
    }

    #[test]
    fn start_publishes_scanning_snapshot() {
        let driver = TaskProgressDriver::new(Arc::new(ManualGateway::default()));

        let stream = driver.start(TaskId::new("task-1")).unwrap();

        assert_eq!(snapshots(&stream), vec![ProgressSnapshot::scanning()]);
        assert_eq!(stream.task_id(), &TaskId::new("task-1"));
        assert!(driver.is_busy());
    }

    #[test]
    fn every_batch_is_published_in_order() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let stream = driver.start(TaskId::new("task-1")).unwrap();

        gateway.push_batch(vec![TaskEvent::ScanProgress { count: 2 }]);
        gateway.push_batch(vec![]);
        gateway.push_batch(vec![stored(), TaskEvent::ScanComplete { count: 2 }]);

        let published = snapshots(&stream);
        assert_eq!(published.len(), 4);
        assert_eq!(published[1].total(), 2);
        assert_eq!(published[1], published[2]);
        assert!(matches!(published[3], ProgressSnapshot::Running(_)));
        assert_eq!(published[3].count(OutcomeLabel::Stored), 1);
    }

    #[test]
    fn completion_ends_stream() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let stream = driver.start(TaskId::new("task-1")).unwrap();

        gateway.push_batch(vec![TaskEvent::Completed]);
        gateway.push_batch(vec![stored()]);

        let published: Vec<_> = stream.iter().collect();
        assert_eq!(published.len(), 2);
        assert_eq!(
            published[1],
            ProgressUpdate::Snapshot(ProgressSnapshot::Completed(TaskProgress::default()))
        );
        assert!(driver.current().is_terminal());
        assert!(!driver.is_busy());
    }

    #[test]
    fn transport_failure_keeps_last_snapshot() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let stream = driver.start(TaskId::new("task-1")).unwrap();

        gateway.push_batch(vec![TaskEvent::ScanProgress { count: 7 }, stored()]);
        let error = SubscriptionError::Transport {
            task_id: TaskId::new("task-1"),
            reason: "socket closed".to_string(),
        };
        gateway.push(Err(error.clone()));

        let updates: Vec<_> = stream.iter().collect();
        let last = match updates.last() {
            Some(ProgressUpdate::Failed { error: reported, last }) => {
                assert_eq!(reported, &error);
                last.clone()
            }
            other => panic!("Expected failure, got {other:?}"),
        };
        assert_eq!(last.total(), 7);
        assert_eq!(last.count(OutcomeLabel::Stored), 1);
        assert_eq!(driver.current(), last);
        assert_eq!(*stream.current(), last);
        assert!(!driver.is_busy());
    }

    #[test]
    fn stop_discards_later_batches() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let stream = driver.start(TaskId::new("task-1")).unwrap();
        let _ = snapshots(&stream);

        driver.stop();
        // Bypass the gateway's own unsubscribe check, as if the batch
        // were already in flight.
        *gateway.unsubscribed.lock().unwrap() = false;
        gateway.push_batch(vec![stored()]);

        assert!(stream.recv().is_none());
        assert_eq!(*stream.current(), ProgressSnapshot::scanning());
        assert_eq!(driver.current(), ProgressSnapshot::Idle);
    }

    #[test]
    fn subscribe_failure_is_reported_and_leaves_driver_idle() {
        let gateway = Arc::new(ManualGateway {
            refuse: true,
            ..Default::default()
        });
        let driver = TaskProgressDriver::new(gateway);

        let result = driver.start(TaskId::new("task-1"));

        assert!(matches!(result, Err(SubscriptionError::Subscribe { .. })));
        assert_eq!(driver.current(), ProgressSnapshot::Idle);
    }

    #[test]
    fn observers_each_receive_every_snapshot() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let first = driver.start(TaskId::new("task-1")).unwrap();

        gateway.push_batch(vec![TaskEvent::ScanProgress { count: 1 }]);
        let second = driver.observe().unwrap();
        gateway.push_batch(vec![stored()]);

        assert_eq!(snapshots(&first).len(), 3);
        let late = snapshots(&second);
        assert_eq!(late.len(), 2);
        assert_eq!(late[0].total(), 1);
        assert_eq!(late[1].count(OutcomeLabel::Stored), 1);
    }

    #[test]
    fn restarting_replaces_previous_task() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let old = driver.start(TaskId::new("task-1")).unwrap();
        gateway.push_batch(vec![stored()]);

        let new = driver.start(TaskId::new("task-2")).unwrap();

        assert_eq!(old.iter().count(), 2);
        assert_eq!(driver.task_id(), Some(TaskId::new("task-2")));
        assert_eq!(new.recv(), Some(ProgressUpdate::Snapshot(ProgressSnapshot::scanning())));
    }

    #[test]
    fn dropped_stream_keeps_driver_busy() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        drop(driver.start(TaskId::new("task-1")).unwrap());

        gateway.push_batch(vec![TaskEvent::ScanProgress { count: 3 }]);
        gateway.push_batch(vec![stored()]);

        assert!(driver.is_busy());
        assert_eq!(driver.current().count(OutcomeLabel::Stored), 1);

        gateway.push_batch(vec![TaskEvent::Completed]);
        assert!(!driver.is_busy());
    }

    #[test]
    fn failed_task_takes_no_new_observers() {
        let gateway = Arc::new(ManualGateway::default());
        let driver = TaskProgressDriver::new(gateway.clone());
        let _stream = driver.start(TaskId::new("task-1")).unwrap();

        gateway.push(Err(SubscriptionError::ChannelClosed {
            task_id: TaskId::new("task-1"),
        }));

        let late = driver.observe().unwrap();
        assert_eq!(late.iter().count(), 1);
        assert!(!driver.is_busy());
    }
}
