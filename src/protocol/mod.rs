//! Protocol module - IBIOS framing, HID reports and frame types.
//!
//! This module implements the byte-level side of the modem link:
//! - Length rules and the write-memory frame with its checksum
//! - HID report decoding and outbound packetization
//! - Frame assembler for accumulating fragmented reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod report;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::{FrameAssembler, DEFAULT_MAX_FRAME_LEN};
pub use report::{
    encode_packet, packetize, report_chunks, InboundReport, Packet, LENGTH_MASK, MAX_CHUNK,
    NOT_CLEAR_TO_SEND, PACKET_SIZE,
};
pub use wire_format::{
    checksum, encode_write_memory, has_start_marker, resolve_frame_length, Discard, FrameLength,
    ABSOLUTE_MAX_FRAME_LEN, ACK_PREFIX, CMD_EVENT_REPORT, CMD_WRITE_MEMORY, EVENT_ACK, EVENT_NAK,
    EXTENDED_FLAG, INSTEON_TX_BUFFER, START_BYTE, TRANSMIT_TRIGGER,
};
