//! In-process gateway that plays back scripted task events.
//!
//! Every started task takes the next queued [`TaskScript`]. Subscribing
//! spawns a producer thread that pushes the script's batches into a
//! [`BatchChannel`] and a delivery thread that hands them to the
//! subscriber, so batches arrive asynchronously like they would from a
//! real backend.

use super::{BatchHandler, SubscriptionHandle, TaskGateway};
use crate::core::sources::{ArchiveSource, ConnectionState, ImportRequest, RegistrationState};
use crate::error::{GatewayError, SubscriptionError};
use crate::events::{BatchChannel, BatchSender, BatchWait, EventBatch, EventKind, TaskEvent, TaskId};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the delivery loop re-checks for unsubscription while idle
const DELIVERY_POLL: Duration = Duration::from_millis(20);

/// Batches a scripted task emits, in order.
#[derive(Debug, Clone, Default)]
pub struct TaskScript {
    pub batches: Vec<EventBatch>,
    /// Pause before each batch
    pub interval: Duration,
    /// Transport failure reported after the last batch, instead of a
    /// plain channel close, when the script never completes
    pub failure: Option<String>,
}

impl TaskScript {
    pub fn new(batches: Vec<EventBatch>) -> Self {
        Self {
            batches,
            interval: Duration::ZERO,
            failure: None,
        }
    }

    /// A task that completes immediately without processing anything.
    pub fn completed() -> Self {
        Self::new(vec![vec![TaskEvent::Completed]])
    }

    /// Parse a JSON array of batches, the backend wire format.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fail the transport with `reason` once the batches run out.
    pub fn failing_with(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

struct GatewayState {
    sources: Vec<ArchiveSource>,
    queued_scripts: VecDeque<TaskScript>,
    pending_tasks: HashMap<TaskId, TaskScript>,
    subscriptions: HashMap<u64, Arc<Mutex<bool>>>,
    next_subscription: u64,
}

/// Gateway backed by scripted batches instead of a backend process
pub struct ScriptedGateway {
    state: Mutex<GatewayState>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState {
                sources: Vec::new(),
                queued_scripts: VecDeque::new(),
                pending_tasks: HashMap::new(),
                subscriptions: HashMap::new(),
                next_subscription: 1,
            }),
        }
    }

    /// Gateway with a single registered, mounted source whose next task
    /// plays `script`.
    pub fn with_registered_source(id: &str, script: TaskScript) -> Self {
        let gateway = Self::new().with_source(ArchiveSource {
            id: id.to_string(),
            registration: RegistrationState::Registered {
                name: id.to_string(),
                group: crate::core::sources::DEFAULT_GROUP.to_string(),
            },
            connection: ConnectionState::Connected {
                mount_point: PathBuf::from("/media").join(id),
            },
        });
        gateway.queue_script(script);
        gateway
    }

    pub fn with_source(self, source: ArchiveSource) -> Self {
        if let Ok(mut state) = self.lock() {
            state.sources.push(source);
        }
        self
    }

    /// Script for the next task started through this gateway.
    ///
    /// Tasks started with no script queued complete immediately.
    pub fn queue_script(&self, script: TaskScript) {
        if let Ok(mut state) = self.lock() {
            state.queued_scripts.push_back(script);
        }
    }

    /// Number of subscriptions still delivering batches
    pub fn active_subscriptions(&self) -> usize {
        self.lock()
            .map(|state| {
                state
                    .subscriptions
                    .values()
                    .filter(|active| *active.lock().unwrap_or_else(|e| e.into_inner()))
                    .count()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, GatewayState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Transport("gateway state lock poisoned".to_string()))
    }

    fn launch(state: &mut GatewayState, task_id: TaskId) -> TaskId {
        let script = state
            .queued_scripts
            .pop_front()
            .unwrap_or_else(TaskScript::completed);
        state.pending_tasks.insert(task_id.clone(), script);
        task_id
    }

    fn find_source<'a>(
        sources: &'a mut [ArchiveSource],
        id: &str,
    ) -> Result<&'a mut ArchiveSource, GatewayError> {
        sources
            .iter_mut()
            .find(|source| source.id == id)
            .ok_or_else(|| GatewayError::UnknownSource { id: id.to_string() })
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGateway for ScriptedGateway {
    fn list_sources(&self) -> Result<Vec<ArchiveSource>, GatewayError> {
        Ok(self.lock()?.sources.clone())
    }

    fn list_groups(&self) -> Result<Vec<String>, GatewayError> {
        let state = self.lock()?;
        let groups: BTreeSet<String> = state
            .sources
            .iter()
            .filter_map(|source| match &source.registration {
                RegistrationState::Registered { group, .. } => Some(group.clone()),
                RegistrationState::Unregistered => None,
            })
            .collect();
        Ok(groups.into_iter().collect())
    }

    fn start_sync(&self, source_id: &str) -> Result<TaskId, GatewayError> {
        let mut state = self.lock()?;
        let source = Self::find_source(&mut state.sources, source_id)?;

        if !source.is_registered() {
            return Err(GatewayError::Rejected(format!(
                "source {source_id} is not registered"
            )));
        }
        if source.mount_point().is_none() {
            return Err(GatewayError::Rejected(format!(
                "source {source_id} is not mounted"
            )));
        }

        let task_id = Self::launch(&mut state, TaskId::new_sync());
        info!(%task_id, source_id, "Started sync task");
        Ok(task_id)
    }

    fn start_import(&self, request: &ImportRequest) -> Result<TaskId, GatewayError> {
        request.validate().map_err(GatewayError::Rejected)?;

        let mut state = self.lock()?;
        let source = Self::find_source(&mut state.sources, &request.source_id)?;

        if source.is_registered() {
            return Err(GatewayError::Rejected(format!(
                "source {} is already registered",
                request.source_id
            )));
        }
        if source.mount_point().is_none() {
            return Err(GatewayError::Rejected(format!(
                "source {} is not mounted",
                request.source_id
            )));
        }

        source.registration = RegistrationState::Registered {
            name: request.name.clone(),
            group: request.group.clone(),
        };

        let task_id = Self::launch(&mut state, TaskId::new_import());
        info!(
            %task_id,
            source_id = %request.source_id,
            tags = ?request.tags,
            "Started import task"
        );
        Ok(task_id)
    }

    fn subscribe_task_events(
        &self,
        task_id: &TaskId,
        on_batch: BatchHandler,
    ) -> Result<SubscriptionHandle, GatewayError> {
        let mut state = self.lock()?;
        let script = state
            .pending_tasks
            .remove(task_id)
            .ok_or_else(|| GatewayError::UnknownTask {
                task_id: task_id.clone(),
            })?;

        let id = state.next_subscription;
        state.next_subscription += 1;
        let active = Arc::new(Mutex::new(true));

        let (sender, receiver) = BatchChannel::new();
        let failure = script.failure.clone();
        spawn_named(format!("task-producer-{id}"), move || {
            produce(script, sender)
        })?;

        let delivery_active = active.clone();
        let delivery_task = task_id.clone();
        spawn_named(format!("task-delivery-{id}"), move || {
            deliver(delivery_task, receiver, delivery_active, failure, on_batch)
        })?;

        state.subscriptions.insert(id, active);
        debug!(%task_id, subscription = id, "Subscribed to task events");
        Ok(SubscriptionHandle::new(id, task_id.clone()))
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), GatewayError> {
        let active = self.lock()?.subscriptions.remove(&handle.id());

        if let Some(active) = active {
            // Waits for an in-flight callback to return.
            *active.lock().unwrap_or_else(|e| e.into_inner()) = false;
            debug!(task_id = %handle.task_id(), subscription = handle.id(), "Unsubscribed");
        }
        Ok(())
    }
}

fn spawn_named<F>(name: String, body: F) -> Result<(), GatewayError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .spawn(body)
        .map(|_| ())
        .map_err(|e| GatewayError::Transport(format!("failed to spawn worker: {e}")))
}

fn produce(script: TaskScript, sender: BatchSender) {
    for batch in script.batches {
        if !script.interval.is_zero() {
            thread::sleep(script.interval);
        }
        if !sender.send(batch) {
            break;
        }
    }
}

fn deliver(
    task_id: TaskId,
    receiver: crate::events::BatchReceiver,
    active: Arc<Mutex<bool>>,
    failure: Option<String>,
    mut on_batch: BatchHandler,
) {
    loop {
        let batch = match receiver.recv_timeout(DELIVERY_POLL) {
            BatchWait::Batch(batch) => batch,
            BatchWait::Timeout => {
                if *active.lock().unwrap_or_else(|e| e.into_inner()) {
                    continue;
                }
                return;
            }
            BatchWait::Disconnected => break,
        };

        let terminal = batch.iter().any(|event| event.kind() == EventKind::Terminal);

        let mut guard = active.lock().unwrap_or_else(|e| e.into_inner());
        if !*guard {
            return;
        }
        on_batch(Ok(batch));
        if terminal {
            *guard = false;
            return;
        }
    }

    let mut guard = active.lock().unwrap_or_else(|e| e.into_inner());
    if !*guard {
        return;
    }
    let error = match failure {
        Some(reason) => SubscriptionError::Transport {
            task_id: task_id.clone(),
            reason,
        },
        None => SubscriptionError::ChannelClosed {
            task_id: task_id.clone(),
        },
    };
    warn!(%task_id, %error, "Task event stream ended before completion");
    on_batch(Err(error));
    *guard = false;
}
