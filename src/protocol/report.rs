//! HID report framing.
//!
//! The modem exchanges 8-byte HID reports. The first byte of each report is a
//! length-and-flow-control word, the rest carries up to 7 bytes of the IBIOS
//! byte stream:
//!
//! ```text
//! ┌───────────────────────────┬─────────────────────┐
//! │ byte 0                    │ bytes 1..8          │
//! │ bit 7: not clear to send  │ payload + zero pad  │
//! │ bits 0-4: payload length  │                     │
//! └───────────────────────────┴─────────────────────┘
//! ```
//!
//! Outbound packets use the same layout with bit 7 left clear.

use crate::error::{PlcError, Result};

/// Size of every HID report/packet in bytes.
pub const PACKET_SIZE: usize = 8;

/// Maximum payload bytes carried by one packet.
pub const MAX_CHUNK: usize = PACKET_SIZE - 1;

/// Mask of the payload length bits in byte 0.
pub const LENGTH_MASK: u8 = 0x1F;

/// Bit in byte 0 that is set while the modem cannot accept more data.
pub const NOT_CLEAR_TO_SEND: u8 = 0x80;

/// One outbound 8-byte packet.
pub type Packet = [u8; PACKET_SIZE];

/// A decoded inbound HID report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundReport<'a> {
    /// IBIOS bytes carried by this report.
    pub payload: &'a [u8],
    /// Flow-control hint: the modem is ready for the next packet.
    pub clear_to_send: bool,
}

impl<'a> InboundReport<'a> {
    /// Decode a raw report.
    ///
    /// Returns `None` for an empty read. A length field larger than the bytes
    /// actually received is clamped.
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        let (&word, rest) = data.split_first()?;
        let len = ((word & LENGTH_MASK) as usize).min(rest.len());
        Some(Self {
            payload: &rest[..len],
            clear_to_send: word & NOT_CLEAR_TO_SEND == 0,
        })
    }
}

/// Encode one chunk of at most 7 bytes into a zero-padded packet.
///
/// # Example
///
/// ```
/// use powerlinc::protocol::encode_packet;
///
/// let packet = encode_packet(&[0x02, 0x46]).unwrap();
/// assert_eq!(packet, [0x02, 0x02, 0x46, 0, 0, 0, 0, 0]);
/// assert!(encode_packet(&[0u8; 8]).is_err());
/// ```
pub fn encode_packet(chunk: &[u8]) -> Result<Packet> {
    if chunk.len() > MAX_CHUNK {
        return Err(PlcError::InvalidArgument(format!(
            "packet chunk of {} bytes exceeds {}",
            chunk.len(),
            MAX_CHUNK
        )));
    }
    Ok(fill_packet(chunk))
}

#[inline]
fn fill_packet(chunk: &[u8]) -> Packet {
    let mut packet = [0u8; PACKET_SIZE];
    packet[0] = chunk.len() as u8;
    packet[1..=chunk.len()].copy_from_slice(chunk);
    packet
}

/// Split a logical message into transport packets, in order.
pub fn packetize(message: &[u8]) -> Vec<Packet> {
    message.chunks(MAX_CHUNK).map(fill_packet).collect()
}

/// Split an IBIOS frame into inbound reports as the modem would send them.
///
/// Every report signals clear-to-send. Used by transport doubles and tests.
pub fn report_chunks(frame: &[u8]) -> Vec<Vec<u8>> {
    packetize(frame).into_iter().map(|p| p.to_vec()).collect()
}
