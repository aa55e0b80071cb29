//! Error types for mc-handshake.

use thiserror::Error;

/// Main error type for handshake recognition and the legacy status path.
///
/// Every variant is fatal to the connection it was raised on. The steady
/// "wait for more bytes" condition is not an error and never appears here;
/// see [`Recognition::NeedMoreData`](crate::Recognition::NeedMoreData).
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// I/O error on the client socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (status response or disconnect notice).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The first packet was not a handshake packet.
    #[error("Your client isn't supported.\nTry connecting with Minecraft {supported}")]
    UnsupportedHandshakeShape {
        /// Packet type the client actually sent.
        packet_type: u32,
        /// Human-readable client version range this server accepts.
        supported: String,
    },

    /// The handshake fields could not be decoded although the declared
    /// packet length was fully buffered.
    #[error("Incorrect amount of data received - hacked client?")]
    MalformedHandshake,

    /// Known handshake shape, unknown version, and the client wants to log in.
    #[error("Unsupported protocol version {version}.\nTry connecting with Minecraft {supported}")]
    UnsupportedVersionLogin {
        /// Protocol version the client declared.
        version: u32,
        /// Human-readable client version range this server accepts.
        supported: String,
    },

    /// The client filled the staging buffer before completing a handshake.
    #[error("Your client sent too much data; please try again later.")]
    ExcessHandshakeData,

    /// The client filled the staging buffer while pinging.
    #[error("Server list ping failed, too much data.")]
    ExcessPingData,

    /// Unrecognized packet id/length combination on the legacy status path.
    #[error("Server list ping failed, unrecognized packet.")]
    MalformedLegacyPacket {
        /// Packet id read from the wire.
        packet_id: u32,
        /// Declared packet length.
        length: u32,
    },

    /// Outbound queue is full; the peer is not reading.
    #[error("Outbound queue full ({pending} packets pending)")]
    OutboundQueueFull {
        /// Packets waiting for the writer task.
        pending: usize,
    },

    /// Outbound channel closed or the peer went away.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl HandshakeError {
    /// Reason text sent to the client in the disconnect notice.
    pub fn disconnect_reason(&self) -> String {
        self.to_string()
    }

    /// Whether a disconnect notice should be attempted before teardown.
    ///
    /// Transport failures mean the socket is already unusable.
    pub fn should_notify(&self) -> bool {
        !matches!(
            self,
            HandshakeError::Io(_)
                | HandshakeError::OutboundQueueFull { .. }
                | HandshakeError::ConnectionClosed
        )
    }
}

/// Result type alias using HandshakeError.
pub type Result<T> = std::result::Result<T, HandshakeError>;
