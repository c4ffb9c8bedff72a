//! Frame struct with typed accessors.
//!
//! A frame is one complete IBIOS message cut from the inbound byte stream.
//! Its boundaries come entirely from its own header bytes, so the type is a
//! thin wrapper over `bytes::Bytes` and clones share the same memory.
//!
//! # Example
//!
//! ```
//! use powerlinc::protocol::Frame;
//! use powerlinc::insteon::Address;
//!
//! let frame = Frame::from_slice(&[0x02, 0x4f, 0x04, 0x11, 0x22, 0x33, 0x2e, 0xff]);
//! let address = Address::new([0x11, 0x22, 0x33]);
//!
//! assert!(frame.is_ack_for(&address));
//! assert_eq!(frame.insteon_payload(), &[0x11, 0x22, 0x33, 0x2e, 0xff][..]);
//! ```

use bytes::Bytes;

use super::wire_format::{ACK_PREFIX, CMD_EVENT_REPORT, EVENT_NAK, START_BYTE};
use crate::insteon::Address;

/// A complete IBIOS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap already-delimited frame bytes.
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Create a frame from a byte slice (copies data).
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    /// Raw frame bytes, marker included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer.
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Frame length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame is empty (never true for assembled frames).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The command byte (`0x4T`), if present.
    #[inline]
    pub fn command(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// The message type nibble selecting the length rule.
    #[inline]
    pub fn message_type(&self) -> Option<u8> {
        self.command().map(|c| c & 0x0F)
    }

    /// Check whether this is an event report (`0x02 0x4F`).
    #[inline]
    pub fn is_event(&self) -> bool {
        self.bytes.len() >= 2 && self.bytes[0] == START_BYTE && self.bytes[1] == CMD_EVENT_REPORT
    }

    /// Check whether this is a NAK event.
    #[inline]
    pub fn is_nak(&self) -> bool {
        self.is_event() && self.bytes.get(2) == Some(&EVENT_NAK)
    }

    /// Check whether this frame acknowledges a message to `address`.
    ///
    /// Bytes `0..3` must be `02 4F 04` and bytes `3..6` the device address.
    pub fn is_ack_for(&self, address: &Address) -> bool {
        self.bytes.len() >= 6
            && self.bytes[..3] == ACK_PREFIX
            && self.bytes[3..6] == address.as_bytes()[..]
    }

    /// The Insteon portion of an event: everything after the 3-byte prefix.
    #[inline]
    pub fn insteon_payload(&self) -> Bytes {
        if self.bytes.len() > 3 {
            self.bytes.slice(3..)
        } else {
            Bytes::new()
        }
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_match() {
        let frame = Frame::from_slice(&[0x02, 0x4f, 0x04, 0x11, 0x22, 0x33, 0x2e, 0xff]);

        assert!(frame.is_ack_for(&Address::new([0x11, 0x22, 0x33])));
        assert!(!frame.is_ack_for(&Address::new([0x44, 0x55, 0x66])));
        assert_eq!(&frame.insteon_payload()[..], &[0x11, 0x22, 0x33, 0x2e, 0xff]);
    }

    #[test]
    fn test_nak_is_not_ack() {
        let frame = Frame::from_slice(&[0x02, 0x4f, 0x05]);
        assert!(frame.is_event());
        assert!(frame.is_nak());
        assert!(!frame.is_ack_for(&Address::new([0x02, 0x4f, 0x05])));
    }

    #[test]
    fn test_short_frame_never_matches() {
        let frame = Frame::from_slice(&[0x02, 0x4f, 0x04, 0x11, 0x22]);
        assert!(!frame.is_ack_for(&Address::new([0x11, 0x22, 0x00])));
    }

    #[test]
    fn test_message_type() {
        let frame = Frame::from_slice(&[0x02, 0x45, 0x06]);
        assert_eq!(frame.command(), Some(0x45));
        assert_eq!(frame.message_type(), Some(0x5));
        assert!(!frame.is_event());
        assert!(Frame::from_slice(&[]).message_type().is_none());
    }

    #[test]
    fn test_bytes_zero_copy() {
        let original = Bytes::from_static(&[0x02, 0x45, 0x06]);
        let frame = Frame::new(original.clone());
        assert_eq!(frame.bytes().as_ptr(), original.as_ptr());
    }
}
