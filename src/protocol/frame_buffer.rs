//! Frame assembler for the inbound IBIOS byte stream.
//!
//! HID reports carry at most 7 bytes each, so frames arrive fragmented and
//! several frames can share one read. The assembler keeps the unconsumed tail
//! in a `bytes::BytesMut` and cuts off frames as soon as their length rule can
//! be satisfied.
//!
//! Faults are never returned to the caller. A buffer that lost sync, starts
//! with an undocumented message type or resolves to an impossible length is
//! logged and dropped as a whole; the next valid start marker resynchronises.
//!
//! # Example
//!
//! ```
//! use powerlinc::protocol::FrameAssembler;
//!
//! let mut assembler = FrameAssembler::new();
//!
//! assert!(assembler.push(&[0x02, 0x4f]).is_empty());
//! let frames = assembler.push(&[0x05, 0x02, 0x45, 0x06]);
//!
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[0].as_bytes(), &[0x02, 0x4f, 0x05]);
//! assert_eq!(frames[1].as_bytes(), &[0x02, 0x45, 0x06]);
//! ```

use bytes::BytesMut;

use super::wire_format::{resolve_frame_length, Discard, FrameLength, ABSOLUTE_MAX_FRAME_LEN};
use super::Frame;
use crate::error::{PlcError, Result};

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = ABSOLUTE_MAX_FRAME_LEN;

/// Buffer for accumulating inbound bytes and extracting complete frames.
pub struct FrameAssembler {
    /// Bytes not yet cut into frames.
    buffer: BytesMut,
    /// Largest frame length accepted before the buffer is treated as corrupt.
    max_frame_len: usize,
}

impl FrameAssembler {
    /// Create an assembler with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create an assembler with a custom frame limit.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_frame_len,
        }
    }

    /// Push received bytes and extract every complete frame, in stream order.
    ///
    /// A trailing partial frame stays buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        "Error processing buffer {:02x?}: {}",
                        &self.buffer[..],
                        e
                    );
                    self.buffer.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Try to cut one frame off the head of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed or the buffer was discarded
    /// - `Err(...)` if the head resolves to a length over the limit
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match resolve_frame_length(&self.buffer) {
            FrameLength::Unresolved => Ok(None),
            FrameLength::Discard(Discard::LostSync) => {
                tracing::error!("Lost sync. Discarding {} buffered bytes", self.buffer.len());
                self.buffer.clear();
                Ok(None)
            }
            FrameLength::Discard(Discard::UnknownType(ty)) => {
                tracing::error!(
                    "Unknown message type {:#x}. Discarding {} buffered bytes",
                    ty,
                    self.buffer.len()
                );
                self.buffer.clear();
                Ok(None)
            }
            FrameLength::Resolved(len) => {
                if len > self.max_frame_len {
                    return Err(PlcError::Protocol(format!(
                        "Frame length {} exceeds maximum {}",
                        len, self.max_frame_len
                    )));
                }
                if self.buffer.len() < len {
                    return Ok(None);
                }
                let frame = Frame::new(self.buffer.split_to(len).freeze());
                tracing::trace!("Assembled frame {:02x?}", frame.as_bytes());
                Ok(Some(frame))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered bytes awaiting the rest of their frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
