//! Legacy status responder.
//!
//! Answers server list queries from clients whose protocol version has no
//! registered handler. It re-frames every packet itself on the connection's
//! staged buffer and understands exactly two requests:
//!
//! | id | length | meaning                                 |
//! |----|--------|-----------------------------------------|
//! | 0  | 1      | status request, answered with JSON      |
//! | 1  | 9      | ping, the 8-byte timestamp is echoed    |
//!
//! Anything else is a protocol violation. The conversation has no natural
//! end: it lasts until the transport closes or a bad packet arrives.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::response::{PingHook, ServerInfo, StatusFields, StatusResponse};
use crate::error::{HandshakeError, Result};
use crate::handler::ClientConnection;
use crate::protocol::{
    next_packet, FrameStatus, PacketBuilder, StagedBuffer, PING_REQUEST_ID,
    PING_REQUEST_LENGTH, PING_RESPONSE_ID, STATUS_REQUEST_ID, STATUS_REQUEST_LENGTH,
    STATUS_RESPONSE_ID,
};

/// Answers status and ping requests without a version handler.
pub struct StatusResponder {
    /// Server registry.
    info: Arc<dyn ServerInfo>,
    /// Optional plugin hook.
    hook: Option<Arc<dyn PingHook>>,
    /// `version.name` in the response.
    version_name: String,
    /// `version.protocol` in the response.
    latest_protocol: u32,
}

impl StatusResponder {
    /// Create a responder.
    pub fn new(info: Arc<dyn ServerInfo>, version_name: impl Into<String>, latest_protocol: u32) -> Self {
        Self {
            info,
            hook: None,
            version_name: version_name.into(),
            latest_protocol,
        }
    }

    /// Install a ping hook.
    pub fn with_hook(mut self, hook: Arc<dyn PingHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// `version.name` reported to clients.
    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    /// `version.protocol` reported to clients.
    pub fn latest_protocol(&self) -> u32 {
        self.latest_protocol
    }

    /// Build the status document for a client, running the ping hook.
    pub fn status_response(&self, peer: &str) -> StatusResponse {
        let mut fields = StatusFields::from_server(self.info.as_ref());
        if let Some(hook) = &self.hook {
            hook.on_server_ping(peer, &mut fields);
        }
        StatusResponse::new(&self.version_name, self.latest_protocol, fields)
    }

    /// Stage `data` and answer every complete request in the buffer.
    ///
    /// Returns the number of requests answered. Incomplete trailing data
    /// stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::ExcessPingData`] if the buffer overflows,
    /// [`HandshakeError::MalformedLegacyPacket`] for any request shape other
    /// than the two above, or whatever `send_data` reports.
    pub fn respond<C>(&self, client: &mut C, buffer: &mut StagedBuffer, data: &[u8]) -> Result<usize>
    where
        C: ClientConnection + ?Sized,
    {
        if buffer.write(data).is_err() {
            return Err(HandshakeError::ExcessPingData);
        }

        let mut answered = 0;
        loop {
            let bounds = match next_packet(buffer) {
                Ok(FrameStatus::Ready(bounds)) => bounds,
                Ok(_) => break,
                Err(_) => {
                    return Err(HandshakeError::MalformedLegacyPacket {
                        packet_id: 0,
                        length: 0,
                    })
                }
            };

            let malformed = |packet_id| HandshakeError::MalformedLegacyPacket {
                packet_id,
                length: bounds.length,
            };

            if bounds.length == 0 {
                return Err(malformed(0));
            }
            let packet_id = buffer.read_varint().map_err(|_| malformed(0))?;
            if bounds.overrun(buffer) {
                return Err(malformed(packet_id));
            }

            // The id must be a one-byte varint so the body is exactly what
            // the request carries; no read may cross into the next packet.
            let reply = match (packet_id, bounds.length, bounds.remaining(buffer)) {
                (STATUS_REQUEST_ID, STATUS_REQUEST_LENGTH, 0) => {
                    self.status_packet(client.peer())?
                }
                (PING_REQUEST_ID, PING_REQUEST_LENGTH, 8) => {
                    let timestamp = buffer.read_i64_be().map_err(|_| malformed(packet_id))?;
                    ping_packet(timestamp)
                }
                _ => return Err(malformed(packet_id)),
            };

            client.send_data(reply)?;
            buffer.commit();
            answered += 1;
        }

        debug!(
            "Answered {} legacy status request(s) for {}, {} byte(s) pending",
            answered,
            client.peer(),
            buffer.used()
        );
        Ok(answered)
    }

    fn status_packet(&self, peer: &str) -> Result<Bytes> {
        let json = self.status_response(peer).to_json()?;
        Ok(PacketBuilder::new(STATUS_RESPONSE_ID).string(&json).build())
    }
}

fn ping_packet(timestamp: i64) -> Bytes {
    PacketBuilder::new(PING_RESPONSE_ID).i64(timestamp).build()
}

impl std::fmt::Debug for StatusResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusResponder")
            .field("version_name", &self.version_name)
            .field("latest_protocol", &self.latest_protocol)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
