//! Client connection contract.
//!
//! Recognition never touches a socket directly. Everything it needs from
//! the connection goes through [`ClientConnection`]:
//! - `send_data` - queue raw bytes for the peer
//! - `kick` - tear the connection down
//! - `set_protocol_version` - tag the connection once the handshake parsed
//!
//! [`MemoryClient`] records all three and is what the unit tests run
//! against; [`ChannelClient`](crate::connection::ChannelClient) is the
//! tokio-backed implementation.

use bytes::Bytes;

use crate::error::{HandshakeError, Result};

/// Operations the handshake layer needs from a client connection.
pub trait ClientConnection {
    /// Peer address, used in log lines.
    fn peer(&self) -> &str;

    /// Queue bytes for the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection can no longer accept data.
    fn send_data(&mut self, data: Bytes) -> Result<()>;

    /// Close the connection. Any disconnect notice has already been queued;
    /// `reason` is for the server side only.
    fn kick(&mut self, reason: &str);

    /// Remember the protocol version the client declared.
    fn set_protocol_version(&mut self, version: u32);
}

/// In-memory connection that records everything sent to it.
#[derive(Debug, Default)]
pub struct MemoryClient {
    peer: String,
    sent: Vec<Bytes>,
    kicked: Option<String>,
    protocol_version: Option<u32>,
}

impl MemoryClient {
    /// Create a recorder for the given peer address.
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            ..Self::default()
        }
    }

    /// Every chunk passed to `send_data`, in order.
    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    /// All sent bytes concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent.iter().flat_map(|b| b.iter().copied()).collect()
    }

    /// Kick reason, if the connection was kicked.
    pub fn kick_reason(&self) -> Option<&str> {
        self.kicked.as_deref()
    }

    /// Check if the connection was kicked.
    pub fn is_kicked(&self) -> bool {
        self.kicked.is_some()
    }

    /// Protocol version tag, if set.
    pub fn protocol_version(&self) -> Option<u32> {
        self.protocol_version
    }
}

impl ClientConnection for MemoryClient {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn send_data(&mut self, data: Bytes) -> Result<()> {
        if self.kicked.is_some() {
            return Err(HandshakeError::ConnectionClosed);
        }
        self.sent.push(data);
        Ok(())
    }

    fn kick(&mut self, reason: &str) {
        self.kicked.get_or_insert_with(|| reason.to_string());
    }

    fn set_protocol_version(&mut self, version: u32) {
        self.protocol_version = Some(version);
    }
}
