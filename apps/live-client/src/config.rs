//! Client configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/taskboard/live.toml`, falling back
//! to `~/.config/taskboard/live.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskboard_connection::{ConnectionConfig, Endpoint};

/// Live client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Server address, e.g. `ws://localhost:8765`.
    #[serde(default)]
    pub endpoint: Endpoint,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl LiveConfig {
    /// Loads configuration from `path`, or returns defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: LiveConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("taskboard").join("live.toml")
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config")
}
