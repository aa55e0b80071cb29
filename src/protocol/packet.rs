//! Outgoing packet construction.
//!
//! Packets sent before a version handler exists are always framed the
//! same way: varint length, varint packet id, payload. No compression or
//! encryption applies at this stage.
//!
//! # Example
//!
//! ```
//! use mc_handshake::protocol::PacketBuilder;
//!
//! let packet = PacketBuilder::new(0x01).i64(42).build();
//! assert_eq!(packet.len(), 10);
//! assert_eq!(packet[0], 9);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{put_string, put_varint, varint_size};

/// Builder for a single length-prefixed packet.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    /// Packet id followed by the payload written so far.
    body: BytesMut,
}

impl PacketBuilder {
    /// Start a packet with the given id.
    pub fn new(packet_id: u32) -> Self {
        let mut body = BytesMut::with_capacity(64);
        put_varint(&mut body, packet_id);
        Self { body }
    }

    /// Append a varint.
    pub fn varint(mut self, value: u32) -> Self {
        put_varint(&mut self.body, value);
        self
    }

    /// Append a varint-length-prefixed UTF-8 string.
    pub fn string(mut self, value: &str) -> Self {
        put_string(&mut self.body, value);
        self
    }

    /// Append a Big Endian `u16`.
    pub fn u16(mut self, value: u16) -> Self {
        self.body.put_u16(value);
        self
    }

    /// Append a Big Endian `i64`.
    pub fn i64(mut self, value: i64) -> Self {
        self.body.put_i64(value);
        self
    }

    /// Append raw bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.put_slice(bytes);
        self
    }

    /// Length of the body (id + payload), i.e. the value of the prefix.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Prefix the body with its length and freeze it.
    pub fn build(self) -> Bytes {
        build_packet(&self.body)
    }
}

/// Prefix an already encoded body (id + payload) with its varint length.
pub fn build_packet(body: &[u8]) -> Bytes {
    let len = body.len() as u32;
    let mut out = BytesMut::with_capacity(varint_size(len) + body.len());
    put_varint(&mut out, len);
    out.put_slice(body);
    out.freeze()
}
