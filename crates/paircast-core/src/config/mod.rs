//! Configuration management for Paircast.
//!
//! Settings live in a TOML file under the platform config directory:
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/paircast/config.toml` |
//! | macOS | `~/Library/Application Support/Paircast/config.toml` |
//! | Windows | `%APPDATA%\Paircast\config.toml` |
//!
//! Loading is forgiving (missing file yields defaults); saving is
//! explicit. The engine consumes only the resolved sync folder, port,
//! and flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for Paircast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name announced to the peer
    pub device_name: String,
    /// Destination directory for received files
    pub sync_folder: PathBuf,
    /// Listening port for incoming connections
    pub port: u16,
    /// Accept incoming files without prompting
    pub auto_accept_files: bool,
    /// Enable clipboard synchronization
    pub clipboard_sync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: crate::invite::local_device_name(),
            sync_folder: default_sync_folder(),
            port: crate::DEFAULT_PORT,
            auto_accept_files: false,
            clipboard_sync: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns defaults if no config file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("failed to create config directory: {e}")))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(&path, content)
            .map_err(|e| Error::Config(format!("failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "paircast", "Paircast")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

/// Default destination for received files: `<Downloads>/paircast`, or a
/// relative fallback when no user directories are available.
#[must_use]
pub fn default_sync_folder() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paircast")
}
