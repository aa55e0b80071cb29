//! Protocol module - wire primitives, staging and framing.
//!
//! This module implements the byte-level layer of the handshake:
//! - varint and Big Endian primitives
//! - staged buffer with commit/reset semantics for partial reads
//! - length-prefix framer
//! - outgoing packet builder and the handshake packet itself

mod framer;
mod handshake;
mod packet;
mod staged_buffer;
mod wire_format;

pub use framer::{next_packet, FrameStatus, PacketBounds};
pub use handshake::Handshake;
pub use packet::{build_packet, PacketBuilder};
pub use staged_buffer::{BufferFull, StagedBuffer};
pub use wire_format::{
    decode_varint, put_string, put_varint, varint_size, Intent, ReadError,
    DEFAULT_MAX_HANDSHAKE_BYTES, DEFAULT_MAX_STRING_LENGTH, DISCONNECT_PACKET_ID,
    HANDSHAKE_PACKET_ID, MAX_VARINT_LEN, PING_REQUEST_ID, PING_REQUEST_LENGTH, PING_RESPONSE_ID,
    STATUS_REQUEST_ID, STATUS_REQUEST_LENGTH, STATUS_RESPONSE_ID,
};
