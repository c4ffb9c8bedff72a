//! Error types for powerlinc.

use std::time::Duration;

use thiserror::Error;

use crate::insteon::Address;

/// Main error type for all PLC operations.
#[derive(Debug, Error)]
pub enum PlcError {
    /// I/O error from the HID transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (malformed frame, bad length field, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Device address could not be parsed.
    #[error("Invalid device address: {0:?}")]
    InvalidAddress(String),

    /// Argument rejected before anything was queued for the modem.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No acknowledgement arrived from the device in time.
    #[error("Device {address} did not ack within {timeout:?}")]
    Timeout {
        /// Target device.
        address: Address,
        /// Configured reply window.
        timeout: Duration,
    },

    /// The PLC connection was shut down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A background task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(String),
}

impl PlcError {
    /// Whether this error is a command timeout.
    ///
    /// Callers decide themselves whether to retry; nothing in the crate retries.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PlcError::Timeout { .. })
    }
}

/// Result type alias using PlcError.
pub type Result<T> = std::result::Result<T, PlcError>;
