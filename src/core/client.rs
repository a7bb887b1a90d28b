//! Launches sync and import tasks and attaches the progress driver to
//! them.

use crate::core::driver::{SnapshotStream, TaskProgressDriver};
use crate::core::progress::ProgressSnapshot;
use crate::core::sources::{ArchiveSource, ImportRequest, SourceAction};
use crate::error::ClientError;
use crate::events::TaskId;
use crate::gateway::TaskGateway;
use std::sync::Arc;
use tracing::info;

/// Entry point for the presentation layer
pub struct ArchiveClient<G: TaskGateway + ?Sized> {
    driver: TaskProgressDriver<G>,
}

impl<G: TaskGateway + ?Sized> ArchiveClient<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            driver: TaskProgressDriver::new(gateway),
        }
    }

    pub fn list_sources(&self) -> Result<Vec<ArchiveSource>, ClientError> {
        Ok(self.driver.gateway().list_sources()?)
    }

    pub fn list_groups(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.driver.gateway().list_groups()?)
    }

    /// Synchronize a registered, mounted source.
    pub fn sync(&self, source: &ArchiveSource) -> Result<SnapshotStream, ClientError> {
        match source.action() {
            SourceAction::Sync => {}
            SourceAction::Import => {
                return Err(ClientError::NotRegistered {
                    id: source.id.clone(),
                })
            }
            SourceAction::Unavailable => {
                return Err(ClientError::SourceUnavailable {
                    id: source.id.clone(),
                })
            }
        }
        self.ensure_idle()?;

        let task_id = self.driver.gateway().start_sync(&source.id)?;
        info!(%task_id, source = %source.label(), "Synchronizing source");
        self.attach(task_id)
    }

    /// Register `request.source_id` in the archive and import it.
    pub fn import(
        &self,
        source: &ArchiveSource,
        request: ImportRequest,
    ) -> Result<SnapshotStream, ClientError> {
        match source.action() {
            SourceAction::Import => {}
            SourceAction::Sync => {
                return Err(ClientError::AlreadyRegistered {
                    id: source.id.clone(),
                })
            }
            SourceAction::Unavailable => {
                return Err(ClientError::SourceUnavailable {
                    id: source.id.clone(),
                })
            }
        }
        if request.source_id != source.id {
            return Err(ClientError::InvalidImport(format!(
                "request is for source {}, not {}",
                request.source_id, source.id
            )));
        }
        request.validate().map_err(ClientError::InvalidImport)?;
        self.ensure_idle()?;

        let task_id = self.driver.gateway().start_import(&request)?;
        info!(%task_id, name = %request.name, group = %request.group, "Importing source");
        self.attach(task_id)
    }

    /// Stop following the current task
    pub fn stop(&self) {
        self.driver.stop();
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.driver.current()
    }

    pub fn driver(&self) -> &TaskProgressDriver<G> {
        &self.driver
    }

    fn ensure_idle(&self) -> Result<(), ClientError> {
        if self.driver.is_busy() {
            return Err(ClientError::TaskInProgress);
        }
        Ok(())
    }

    fn attach(&self, task_id: TaskId) -> Result<SnapshotStream, ClientError> {
        Ok(self.driver.start(task_id)?)
    }
}
