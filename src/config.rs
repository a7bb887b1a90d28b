//! Configuration file support.
//!
//! The config lives at `<config dir>/photo-archive/config.toml` and is
//! created with defaults on first use.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const APP_DIR: &str = "photo-archive";
const CONFIG_FILE: &str = "config.toml";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory the archive is stored in. Only the backend uses it; the
    /// client keeps it so config files stay interchangeable.
    pub archive_dir: PathBuf,
    /// Pause between batches when replaying recorded tasks
    pub event_poll_interval_ms: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir().unwrap_or_else(|| PathBuf::from(APP_DIR)),
            event_poll_interval_ms: 100,
        }
    }
}

fn default_archive_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR))
}

impl ArchiveConfig {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the config from its default location, writing the defaults
    /// there if it does not exist yet.
    pub fn load_or_initialize() -> Result<Self, ConfigError> {
        if default_archive_dir().is_none() {
            return Err(ConfigError::NoDataDir);
        }
        Self::load_or_initialize_at(&Self::default_path()?)
    }

    pub fn load_or_initialize_at(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        config.save_to(path)?;
        info!(path = %path.display(), "Wrote default configuration");
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_initialized_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let config = ArchiveConfig::load_or_initialize_at(&path).unwrap();

        assert_eq!(config, ArchiveConfig::default());
        assert!(path.exists());
        assert_eq!(ArchiveConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "archive_dir = \"/srv/archive\"\n").unwrap();

        let config = ArchiveConfig::load_or_initialize_at(&path).unwrap();

        assert_eq!(config.archive_dir, PathBuf::from("/srv/archive"));
        assert_eq!(config.event_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "archive_dir = ").unwrap();

        let result = ArchiveConfig::load_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
