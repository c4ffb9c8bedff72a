//! Insteon device layer - addresses, command payloads and device types.
//!
//! Provides:
//! - [`Address`] - validated 3-byte device address
//! - [`InsteonCommand`] - flags/cmd1/cmd2/extra payload
//! - [`Dimmer`] - level control on top of a [`CommandSession`](crate::CommandSession)

mod address;
mod command;
mod dimmer;

pub use address::Address;
pub use command::{cmd, InsteonCommand, DEFAULT_FLAGS, MAX_EXTRA_LEN};
pub use dimmer::{level_to_percent, percent_to_level, Dimmer};
