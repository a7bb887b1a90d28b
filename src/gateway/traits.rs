//! Gateway trait definition.

use crate::core::sources::{ArchiveSource, ImportRequest};
use crate::error::{GatewayError, SubscriptionError};
use crate::events::{EventBatch, TaskId};

/// Callback receiving every batch of a subscription, or the transport
/// failure that ended it.
pub type BatchHandler = Box<dyn FnMut(Result<EventBatch, SubscriptionError>) + Send + 'static>;

/// Token returned by [`TaskGateway::subscribe_task_events`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    task_id: TaskId,
}

impl SubscriptionHandle {
    pub fn new(id: u64, task_id: TaskId) -> Self {
        Self { id, task_id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}

/// Command/event boundary to the archive backend
pub trait TaskGateway: Send + Sync {
    /// Registered and mounted sources
    fn list_sources(&self) -> Result<Vec<ArchiveSource>, GatewayError>;

    /// Names of the groups registered sources belong to
    fn list_groups(&self) -> Result<Vec<String>, GatewayError>;

    /// Start synchronizing a registered source
    fn start_sync(&self, source_id: &str) -> Result<TaskId, GatewayError>;

    /// Register a new source and start importing it
    fn start_import(&self, request: &ImportRequest) -> Result<TaskId, GatewayError>;

    /// Deliver the event batches of `task_id` to `on_batch`, in order,
    /// until the task's terminal event or a transport failure.
    fn subscribe_task_events(
        &self,
        task_id: &TaskId,
        on_batch: BatchHandler,
    ) -> Result<SubscriptionHandle, GatewayError>;

    /// Stop delivering batches for a subscription.
    ///
    /// No batch is handed to the callback once this returns.
    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), GatewayError>;
}
