//! Config file support
//!
//! Loads optional settings from ~/.config/parley/config.toml. Values here
//! are the lowest-priority source; flags and environment variables win.

use anyhow::{Context, Result};
use parley_core::RelaySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Relay settings
    #[serde(default)]
    pub relay: RelaySettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files
    pub dir: Option<PathBuf>,
}

impl FileConfig {
    /// Load from an explicit path (must exist) or the default path (optional).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_path(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("parley").join("config.toml"))
    }
}
