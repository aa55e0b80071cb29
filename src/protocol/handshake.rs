//! Handshake packet fields.
//!
//! ```text
//! varint packet-id (0) │ varint protocol-version │ string server-address
//!                      │ u16 server-port (BE)    │ varint next-state
//! ```

use bytes::Bytes;

use super::packet::PacketBuilder;
use super::staged_buffer::StagedBuffer;
use super::wire_format::{Intent, ReadError, HANDSHAKE_PACKET_ID};

/// Fields declared by a client's first packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Wire protocol version.
    pub protocol_version: u32,
    /// Address the client used to reach this server.
    pub server_address: String,
    /// Port the client used to reach this server.
    pub server_port: u16,
    /// What the client wants to do next.
    pub intent: Intent,
}

impl Handshake {
    /// Create a handshake.
    pub fn new(
        protocol_version: u32,
        server_address: impl Into<String>,
        server_port: u16,
        intent: Intent,
    ) -> Self {
        Self {
            protocol_version,
            server_address: server_address.into(),
            server_port,
            intent,
        }
    }

    /// Decode the fields that follow the packet id.
    ///
    /// The caller has already read the packet id.
    pub fn decode_fields(buffer: &mut StagedBuffer, max_address_len: usize) -> Result<Self, ReadError> {
        let protocol_version = buffer.read_varint()?;
        let server_address = buffer.read_utf8(max_address_len)?;
        let server_port = buffer.read_u16_be()?;
        let next_state = buffer.read_varint()?;

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            intent: Intent::from_raw(next_state),
        })
    }

    /// Encode as a complete, length-prefixed handshake packet.
    ///
    /// # Example
    ///
    /// ```
    /// use mc_handshake::protocol::{Handshake, Intent};
    ///
    /// let packet = Handshake::new(47, "localhost", 25565, Intent::Status).encode();
    /// assert_eq!(packet[0] as usize, packet.len() - 1);
    /// ```
    pub fn encode(&self) -> Bytes {
        PacketBuilder::new(HANDSHAKE_PACKET_ID)
            .varint(self.protocol_version)
            .string(&self.server_address)
            .u16(self.server_port)
            .varint(self.intent.as_raw())
            .build()
    }
}
