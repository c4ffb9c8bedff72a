//! # powerlinc
//!
//! Rust driver for Insteon PowerLinc USB modems.
//!
//! The modem speaks IBIOS over 8-byte HID reports. This crate reassembles
//! the inbound byte stream into frames, fans them out to registered filters,
//! writes outbound messages under clear-to-send flow control and pairs
//! device commands with their acknowledgements.
//!
//! ## Architecture
//!
//! - **Reader** (blocking pool): HID reports → CTS hint + [`protocol::FrameAssembler`] → [`Dispatcher`]
//! - **Writer** (async task): queued messages → 8-byte packets, one per CTS
//! - **Sessions**: [`CommandSession`] stages a command in modem memory,
//!   triggers transmission and waits for the device's ack
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use powerlinc::{Plc, Result};
//! use powerlinc::transport::MockTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let plc = Plc::builder()
//!         .command_timeout(Duration::from_secs(2))
//!         .start(MockTransport::new())?;
//!
//!     let dimmer = plc.dimmer("11.22.33".parse()?);
//!     match dimmer.get_percent().await {
//!         Ok(level) => println!("level: {level:?}"),
//!         Err(e) if e.is_timeout() => println!("device did not answer"),
//!         Err(e) => return Err(e),
//!     }
//!
//!     plc.shutdown().await
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod insteon;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

mod plc;

pub use config::PlcConfig;
pub use dispatch::{Dispatcher, Filter, FilterGuard, FilterId};
pub use error::{PlcError, Result};
pub use insteon::{Address, Dimmer, InsteonCommand};
pub use plc::{Plc, PlcBuilder};
pub use session::CommandSession;
