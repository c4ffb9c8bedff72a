//! Dispatch module - ordered filter chain for inbound frames.
//!
//! Provides:
//! - [`Dispatcher`] - registry of filters, publishes each frame through them
//! - [`Filter`] - callback that observes, rewrites or vetoes a frame
//! - [`FilterGuard`] - unregisters its filter when dropped
//!
//! # Example
//!
//! ```
//! use powerlinc::dispatch::Dispatcher;
//! use powerlinc::protocol::Frame;
//!
//! let dispatcher = Dispatcher::new();
//!
//! // Drop NAKs before anything else sees them
//! let _nak = dispatcher.register(|frame: Frame| (!frame.is_nak()).then_some(frame));
//!
//! let seen = dispatcher.publish(Frame::from_slice(&[0x02, 0x4f, 0x05]));
//! assert!(seen.is_none());
//! ```

mod registry;

pub use registry::{Dispatcher, Filter, FilterGuard, FilterId};
