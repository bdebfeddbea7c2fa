//! Error types for Lanbeam.
//!
//! This module provides a unified error type for all Lanbeam operations,
//! with specific error variants for different failure modes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized `Result` type for Lanbeam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Lanbeam.
#[derive(Error, Debug)]
pub enum Error {
    /// No session is registered for the device (E001)
    #[error("device '{0}' is offline")]
    DeviceOffline(String),

    /// Writing to the device's connection failed (E002)
    #[error("connection lost to device '{0}'")]
    ConnectionLost(String),

    /// A decision arrived with no matching pending offer (E003)
    #[error("stale decision from device '{0}': no pending offer")]
    StaleDecision(String),

    /// File not found (E004)
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The source file shrank while it was being streamed (E005)
    #[error("file '{}' changed during transfer: expected {expected} bytes, read {actual}", path.display())]
    FileChanged {
        /// The file being streamed
        path: PathBuf,
        /// Size declared in the metadata frame
        expected: u64,
        /// Bytes actually read before EOF
        actual: u64,
    },

    /// The device never answered the offer
    #[error("offer to device '{0}' expired without an answer")]
    OfferExpired(String),

    /// Invalid path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid protocol message
    #[error("invalid protocol message: {0}")]
    ProtocolError(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern EXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::DeviceOffline(_) => Some("E001"),
            Self::ConnectionLost(_) => Some("E002"),
            Self::StaleDecision(_) => Some("E003"),
            Self::FileNotFound(_) => Some("E004"),
            Self::FileChanged { .. } => Some("E005"),
            _ => None,
        }
    }

    /// Returns whether the initiator may simply offer the file again.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost(_) | Self::OfferExpired(_) | Self::FileChanged { .. }
        )
    }

    /// Returns whether this error means the device connection is gone.
    ///
    /// Only these errors end a session endpoint loop.
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
