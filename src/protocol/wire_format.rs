//! IBIOS wire format: frame length rules and memory-write encoding.
//!
//! Every IBIOS message starts with a two-byte marker:
//! ```text
//! ┌──────┬────────────┬──────────────────────────┐
//! │ 0x02 │ 0x4T       │ type-specific body       │
//! │ STX  │ T = type   │ length fixed by type T   │
//! └──────┴────────────┴──────────────────────────┘
//! ```
//!
//! The low nibble `T` selects how long the frame is. Some types have a fixed
//! length, others carry a length byte/word or run up to a terminator.
//! Multi-byte integers are Big Endian.

use crate::error::{PlcError, Result};

/// First byte of every IBIOS frame.
pub const START_BYTE: u8 = 0x02;

/// High nibble the second byte must carry.
pub const COMMAND_NIBBLE: u8 = 0x40;

/// Terminator used by type-3 frames.
pub const END_BYTE: u8 = 0x03;

/// Write-memory command (`0x02 0x40 ...`).
pub const CMD_WRITE_MEMORY: u8 = 0x40;

/// Event report command (`0x02 0x4F ...`).
pub const CMD_EVENT_REPORT: u8 = 0x4F;

/// Event code meaning the Insteon message was acknowledged.
pub const EVENT_ACK: u8 = 0x04;

/// Event code meaning the modem refused the request.
pub const EVENT_NAK: u8 = 0x05;

/// Insteon flags bit marking an extended (25-byte) message.
pub const EXTENDED_FLAG: u8 = 0x10;

/// Offset of the Insteon flags byte inside a type-F event frame.
pub const EVENT_FLAGS_OFFSET: usize = 9;

/// Length of a type-F event carrying a standard Insteon message.
pub const STANDARD_EVENT_LEN: usize = 12;

/// Length of a type-F event carrying an extended Insteon message.
pub const EXTENDED_EVENT_LEN: usize = 26;

/// Length of a type-F NAK.
pub const NAK_EVENT_LEN: usize = 3;

/// Header bytes of a write-memory frame (marker + address + length + checksum).
pub const WRITE_MEMORY_HEADER_SIZE: usize = 8;

/// Fixed overhead of a type-2 frame on top of its length field.
pub const TYPE2_OVERHEAD: usize = 9;

/// Largest frame any length rule can produce (type 2 with a maximal length word).
pub const ABSOLUTE_MAX_FRAME_LEN: usize = u16::MAX as usize + TYPE2_OVERHEAD;

/// Offset in the modem's flat memory map where the outbound Insteon message is staged.
pub const INSTEON_TX_BUFFER: u16 = 0x01a4;

/// Control frame asking the modem to transmit the staged Insteon message.
pub const TRANSMIT_TRIGGER: [u8; 6] = [0x02, 0x46, 0x01, 0x42, 0x10, 0xff];

/// Ack prefix of a reply frame: event report, message acknowledged.
pub const ACK_PREFIX: [u8; 3] = [START_BYTE, CMD_EVENT_REPORT, EVENT_ACK];

/// Why a buffer had to be thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Buffer did not begin with the start marker.
    LostSync,
    /// Message type 0xB-0xE: undocumented, length unknown.
    UnknownType(u8),
}

/// Outcome of applying the length rules to the head of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// The frame at the head of the buffer is this many bytes long.
    ///
    /// The buffer may not hold all of them yet.
    Resolved(usize),
    /// More bytes are needed before the length can be known.
    Unresolved,
    /// The whole buffer must be dropped.
    Discard(Discard),
}

/// Check the two-byte start marker.
#[inline]
pub fn has_start_marker(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == START_BYTE && buf[1] & 0xF0 == COMMAND_NIBBLE
}

/// Resolve the length of the frame at the head of `buf`.
///
/// | type | length |
/// |------|--------|
/// | 0, 6 | 7 |
/// | 1 | `buf[2] + 3` |
/// | 2 | BE u16 at `buf[4..6]` + 9 |
/// | 3 | up to and including the first `0x03` |
/// | 4, 8 | 9 |
/// | 5 | 3 |
/// | 7 | 5 |
/// | 9, A | 4 |
/// | F | 3 (NAK), 12 (standard) or 26 (extended) |
/// | B-E | discard |
///
/// # Example
///
/// ```
/// use powerlinc::protocol::{resolve_frame_length, FrameLength};
///
/// assert_eq!(resolve_frame_length(&[0x02, 0x45]), FrameLength::Resolved(3));
/// assert_eq!(resolve_frame_length(&[0x02, 0x41]), FrameLength::Unresolved);
/// ```
pub fn resolve_frame_length(buf: &[u8]) -> FrameLength {
    if buf.len() < 2 {
        return FrameLength::Unresolved;
    }
    if !has_start_marker(buf) {
        return FrameLength::Discard(Discard::LostSync);
    }

    let msg_type = buf[1] & 0x0F;
    match msg_type {
        0x0 | 0x6 => FrameLength::Resolved(7),
        0x1 => match buf.get(2) {
            Some(&n) => FrameLength::Resolved(n as usize + 3),
            None => FrameLength::Unresolved,
        },
        0x2 => {
            if buf.len() < 6 {
                return FrameLength::Unresolved;
            }
            let len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
            FrameLength::Resolved(len + TYPE2_OVERHEAD)
        }
        0x3 => match buf[2..].iter().position(|&b| b == END_BYTE) {
            Some(pos) => FrameLength::Resolved(pos + 3),
            None => FrameLength::Unresolved,
        },
        0x4 | 0x8 => FrameLength::Resolved(9),
        0x5 => FrameLength::Resolved(3),
        0x7 => FrameLength::Resolved(5),
        0x9 | 0xA => FrameLength::Resolved(4),
        0xF => {
            if buf.len() < 3 {
                return FrameLength::Unresolved;
            }
            if buf[2] == EVENT_NAK {
                return FrameLength::Resolved(NAK_EVENT_LEN);
            }
            if buf.len() < STANDARD_EVENT_LEN {
                return FrameLength::Unresolved;
            }
            if buf[EVENT_FLAGS_OFFSET] & EXTENDED_FLAG != 0 {
                FrameLength::Resolved(EXTENDED_EVENT_LEN)
            } else {
                FrameLength::Resolved(STANDARD_EVENT_LEN)
            }
        }
        other => FrameLength::Discard(Discard::UnknownType(other)),
    }
}

/// Checksum of a write-memory frame.
///
/// The two's-complement negation of the byte sum, so that
/// `checksum + sum(bytes) == 0 (mod 2^16)`.
#[inline]
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
        .wrapping_neg()
}

/// Encode a write-memory frame that stores `payload` at `location`.
///
/// ```text
/// 0x02 0x40 | loc (u16 BE) | len (u16 BE) | checksum (u16 BE) | payload
/// ```
///
/// The checksum covers the location, length and payload bytes.
///
/// # Example
///
/// ```
/// use powerlinc::protocol::encode_write_memory;
///
/// let frame = encode_write_memory(0x01a4, &[0x0f, 0x01, 0x42, 0x10, 0xff]).unwrap();
/// assert_eq!(&frame[..6], &[0x02, 0x40, 0x01, 0xa4, 0x00, 0x05]);
/// assert_eq!(frame.len(), 8 + 5);
/// ```
pub fn encode_write_memory(location: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        PlcError::InvalidArgument(format!(
            "write-memory payload of {} bytes exceeds {}",
            payload.len(),
            u16::MAX
        ))
    })?;

    let mut buf = Vec::with_capacity(WRITE_MEMORY_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&[START_BYTE, CMD_WRITE_MEMORY]);
    buf.extend_from_slice(&location.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());

    let sum = checksum(&buf[2..6]).wrapping_add(checksum(payload));
    buf.extend_from_slice(&sum.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_lengths() {
        let cases: [(u8, usize); 8] = [
            (0x0, 7),
            (0x4, 9),
            (0x5, 3),
            (0x6, 7),
            (0x7, 5),
            (0x8, 9),
            (0x9, 4),
            (0xA, 4),
        ];
        for (ty, len) in cases {
            assert_eq!(
                resolve_frame_length(&[START_BYTE, COMMAND_NIBBLE | ty]),
                FrameLength::Resolved(len),
                "type {ty:#x}"
            );
        }
    }

    #[test]
    fn test_type1_length_byte() {
        assert_eq!(resolve_frame_length(&[0x02, 0x41]), FrameLength::Unresolved);
        assert_eq!(
            resolve_frame_length(&[0x02, 0x41, 0x04]),
            FrameLength::Resolved(7)
        );
    }

    #[test]
    fn test_type2_length_word() {
        assert_eq!(
            resolve_frame_length(&[0x02, 0x42, 0x01, 0xa4, 0x00]),
            FrameLength::Unresolved
        );
        assert_eq!(
            resolve_frame_length(&[0x02, 0x42, 0x01, 0xa4, 0x01, 0x02]),
            FrameLength::Resolved(0x0102 + 9)
        );
    }

    #[test]
    fn test_type3_terminator() {
        assert_eq!(
            resolve_frame_length(&[0x02, 0x43, 0x41, 0x42]),
            FrameLength::Unresolved
        );
        assert_eq!(
            resolve_frame_length(&[0x02, 0x43, 0x41, 0x03, 0x02]),
            FrameLength::Resolved(4)
        );
    }

    #[test]
    fn test_type_f_variants() {
        assert_eq!(resolve_frame_length(&[0x02, 0x4f]), FrameLength::Unresolved);
        assert_eq!(
            resolve_frame_length(&[0x02, 0x4f, 0x05]),
            FrameLength::Resolved(3)
        );
        assert_eq!(
            resolve_frame_length(&[0x02, 0x4f, 0x04, 0x11]),
            FrameLength::Unresolved
        );

        let mut standard = [0u8; 12];
        standard[..3].copy_from_slice(&ACK_PREFIX);
        standard[9] = 0x2f;
        assert_eq!(resolve_frame_length(&standard), FrameLength::Resolved(12));

        standard[9] = 0x1f;
        assert_eq!(resolve_frame_length(&standard), FrameLength::Resolved(26));
    }

    #[test]
    fn test_unknown_types_discard() {
        for ty in 0xB..=0xE {
            assert_eq!(
                resolve_frame_length(&[0x02, 0x40 | ty]),
                FrameLength::Discard(Discard::UnknownType(ty))
            );
        }
    }

    #[test]
    fn test_lost_sync() {
        assert_eq!(
            resolve_frame_length(&[0x00, 0x40]),
            FrameLength::Discard(Discard::LostSync)
        );
        assert_eq!(
            resolve_frame_length(&[0x02, 0x50]),
            FrameLength::Discard(Discard::LostSync)
        );
        assert_eq!(resolve_frame_length(&[0x99]), FrameLength::Unresolved);
    }

    #[test]
    fn test_checksum_zero_sum() {
        let bytes = [0x01, 0xa4, 0x00, 0x05, 0x0f, 0x01, 0x42, 0x10, 0xff];
        let sum = bytes.iter().fold(0u16, |a, &b| a.wrapping_add(b as u16));
        assert_eq!(checksum(&bytes).wrapping_add(sum), 0);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_write_memory_concrete() {
        let frame = encode_write_memory(0x01a4, &[0x0f, 0x01, 0x42, 0x10, 0xff]).unwrap();
        // 0x01 + 0xa4 + 0x05 + 0x0f + 0x01 + 0x42 + 0x10 + 0xff = 0x020b
        assert_eq!(
            frame,
            vec![0x02, 0x40, 0x01, 0xa4, 0x00, 0x05, 0xfd, 0xf5, 0x0f, 0x01, 0x42, 0x10, 0xff]
        );
    }

    #[test]
    fn test_write_memory_rejects_oversized_payload() {
        let payload = vec![0u8; u16::MAX as usize + 1];
        let err = encode_write_memory(0, &payload).unwrap_err();
        assert!(matches!(err, PlcError::InvalidArgument(_)));
    }

    #[test]
    fn test_write_memory_large_sum_wraps() {
        let payload = vec![0xffu8; 300];
        let frame = encode_write_memory(0xffff, &payload).unwrap();
        let stored = u16::from_be_bytes([frame[6], frame[7]]);
        let sum = frame[2..6]
            .iter()
            .chain(payload.iter())
            .fold(0u16, |a, &b| a.wrapping_add(b as u16));
        assert_eq!(stored.wrapping_add(sum), 0);
    }
}
