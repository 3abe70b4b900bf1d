//! Error types for talking to the scale and persisting readings.
//!
//! Decoding never produces an error: unknown or truncated frames decode to
//! [`crate::Frame::Unknown`]. Everything here comes from the BLE link, the
//! filesystem or configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("No device named '{name}' found within {timeout:?}")]
    DeviceNotFound { name: String, timeout: Duration },

    #[error("Service {0} not found on device")]
    ServiceNotFound(Uuid),

    #[error("Characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),

    #[error("Write to {characteristic} failed: {reason}")]
    WriteFailed { characteristic: Uuid, reason: String },

    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Whether repeating the failed operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Bluetooth(_) | Error::Timeout { .. } | Error::WriteFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
