//! PLC configuration.
//!
//! Loadable from JSON; every field is optional and durations are given in
//! milliseconds.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use powerlinc::PlcConfig;
//!
//! let config = PlcConfig::from_json_str(r#"{ "command_timeout_ms": 2500 }"#).unwrap();
//! assert_eq!(config.command_timeout(), Duration::from_millis(2500));
//! assert_eq!(config.report_size, 8);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::{DEFAULT_MAX_FRAME_LEN, PACKET_SIZE};

/// Default transport read timeout.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Default CTS re-check interval.
pub const DEFAULT_CTS_POLL_INTERVAL_MS: u64 = 100;

/// Default device acknowledgement timeout.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

/// Tunables for a PLC connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlcConfig {
    /// Bytes requested per transport read.
    pub report_size: usize,
    /// How long one transport read may block.
    pub read_timeout_ms: u64,
    /// Fallback interval for re-checking clear-to-send.
    pub cts_poll_interval_ms: u64,
    /// How long a command waits for the device's ack.
    pub command_timeout_ms: u64,
    /// Largest inbound frame accepted before the buffer is reset.
    pub max_frame_len: usize,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            report_size: PACKET_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            cts_poll_interval_ms: DEFAULT_CTS_POLL_INTERVAL_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl PlcConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Transport read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// CTS re-check interval.
    pub fn cts_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cts_poll_interval_ms)
    }

    /// Device acknowledgement timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
