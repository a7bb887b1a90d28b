//! Archive sources as listed by the backend, and the request used to
//! register a new one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Group new sources land in unless the user picks another one
pub const DEFAULT_GROUP: &str = "ROOT";

/// A storage source known to the archive or currently mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSource {
    pub id: String,
    pub registration: RegistrationState,
    pub connection: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RegistrationState {
    Registered { name: String, group: String },
    Unregistered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ConnectionState {
    #[serde(rename_all = "camelCase")]
    Connected { mount_point: PathBuf },
    Disconnected,
}

/// What the user can do with a source right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    /// Registered and mounted: synchronize it
    Sync,
    /// Mounted but unknown to the archive: import it
    Import,
    /// Not mounted
    Unavailable,
}

impl ArchiveSource {
    pub fn is_registered(&self) -> bool {
        matches!(self.registration, RegistrationState::Registered { .. })
    }

    pub fn mount_point(&self) -> Option<&Path> {
        match &self.connection {
            ConnectionState::Connected { mount_point } => Some(mount_point),
            ConnectionState::Disconnected => None,
        }
    }

    pub fn action(&self) -> SourceAction {
        match (&self.connection, &self.registration) {
            (ConnectionState::Disconnected, _) => SourceAction::Unavailable,
            (_, RegistrationState::Registered { .. }) => SourceAction::Sync,
            (_, RegistrationState::Unregistered) => SourceAction::Import,
        }
    }

    /// Name shown to the user: registered name, else mount point, else id
    pub fn label(&self) -> String {
        match (&self.registration, &self.connection) {
            (RegistrationState::Registered { name, .. }, _) => name.clone(),
            (_, ConnectionState::Connected { mount_point }) => mount_point.display().to_string(),
            _ => self.id.clone(),
        }
    }
}

/// Registration of a new source in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub source_id: String,
    #[serde(rename = "sourceName")]
    pub name: String,
    #[serde(rename = "sourceGroup")]
    pub group: String,
    #[serde(rename = "sourceTags", default)]
    pub tags: Vec<String>,
}

impl ImportRequest {
    /// Request prefilled from a source: named after the last component
    /// of its mount point, in the default group.
    pub fn for_source(source: &ArchiveSource) -> Self {
        let name = source
            .mount_point()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "-".to_string());

        Self {
            source_id: source.id.clone(),
            name,
            group: DEFAULT_GROUP.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Check the fields the backend requires.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.trim().is_empty() {
            return Err("source id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.group.trim().is_empty() {
            return Err("group is required".to_string());
        }
        Ok(())
    }
}
