//! Configuration management for Lanbeam.
//!
//! This module handles loading, saving, and validating Lanbeam
//! configuration. Every section falls back to defaults for missing keys, so
//! a partial file is always valid.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/lanbeam/config.toml` |
//! | macOS | `~/Library/Application Support/com.lanbeam.Lanbeam/config.toml` |
//! | Windows | `%APPDATA%\lanbeam\Lanbeam\config\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [server]
//! port = 8000
//! upload_dir = "uploads"
//!
//! [transfer]
//! chunk_size = 65536
//! offer_timeout = "60s"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for Lanbeam.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// UI settings
    pub ui: UiConfig,
}

/// HTTP server configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind to localhost only
    pub localhost_only: bool,
    /// Directory files uploaded by devices are saved to
    pub upload_dir: PathBuf,
    /// Largest accepted upload in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            localhost_only: false,
            upload_dir: PathBuf::from(crate::DEFAULT_UPLOAD_DIR),
            max_upload_size: crate::DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// Transfer configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk size for streamed files
    pub chunk_size: usize,
    /// How long a device has to answer an offer
    #[serde(with = "humantime_serde")]
    pub offer_timeout: Duration,
    /// Outbound frames queued per connection before senders wait
    pub frame_buffer: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            offer_timeout: Duration::from_secs(crate::DEFAULT_OFFER_TIMEOUT_SECS),
            frame_buffer: crate::DEFAULT_FRAME_BUFFER,
        }
    }
}

/// UI configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Print a QR code of the upload page on start
    pub show_qr: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { show_qr: true }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed, or validated.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, defaulting if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Check values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.chunk_size == 0 {
            return Err(Error::InvalidConfig {
                key: "transfer.chunk_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.transfer.frame_buffer == 0 {
            return Err(Error::InvalidConfig {
                key: "transfer.frame_buffer".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.transfer.offer_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "transfer.offer_timeout".into(),
                reason: "must be at least one second".into(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "lanbeam", "Lanbeam")
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

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.strip_suffix('s')
            .map(|secs| {
                secs.parse()
                    .map(Duration::from_secs)
                    .map_err(serde::de::Error::custom)
            })
            .or_else(|| {
                s.strip_suffix('m').map(|mins| {
                    mins.parse::<u64>()
                        .map(|m| Duration::from_secs(m * 60))
                        .map_err(serde::de::Error::custom)
                })
            })
            .unwrap_or_else(|| Err(serde::de::Error::custom("invalid duration format")))
    }
}
