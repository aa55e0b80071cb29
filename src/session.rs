//! Per-connection handshake session.
//!
//! Owns the staged buffer for one client and routes each new chunk to
//! whichever stage is active:
//!
//! ```text
//! Recognizing ──► Dispatched      (handler returned to the caller)
//!      │
//!      └────────► LegacyPing ──► Closed
//!      └────────────────────────► Closed
//! ```
//!
//! Fatal errors are handled here: a best-effort disconnect notice, then a
//! kick. The caller only ever sees a handler or nothing.

use std::sync::Arc;

use tracing::info;

use crate::error::HandshakeError;
use crate::handler::{ClientConnection, ProtocolHandler};
use crate::protocol::StagedBuffer;
use crate::recognizer::{send_disconnect, Recognition, Recognizer};
use crate::status::StatusResponder;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a complete handshake packet.
    Recognizing,
    /// Answering status requests for an unsupported version.
    LegacyPing,
    /// A handler owns the connection.
    Dispatched,
    /// The connection was kicked.
    Closed,
}

/// Handshake state for one connection.
#[derive(Debug)]
pub struct HandshakeSession {
    recognizer: Arc<Recognizer>,
    responder: Arc<StatusResponder>,
    buffer: StagedBuffer,
    state: SessionState,
}

impl HandshakeSession {
    /// Create a session with a buffer sized from the recognizer's config.
    pub fn new(recognizer: Arc<Recognizer>, responder: Arc<StatusResponder>) -> Self {
        let buffer = recognizer.new_buffer();
        Self {
            recognizer,
            responder,
            buffer,
            state: SessionState::Recognizing,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Staged bytes not yet committed.
    pub fn buffered(&self) -> usize {
        self.buffer.used()
    }

    /// Feed newly arrived bytes.
    ///
    /// Returns the handler when recognition completes on this chunk; `data`
    /// then holds the bytes that followed the handshake. Returns `None` while
    /// waiting, on the legacy path, after a kick, and once dispatched.
    pub fn on_data(
        &mut self,
        client: &mut dyn ClientConnection,
        data: &mut &[u8],
    ) -> Option<Box<dyn ProtocolHandler>> {
        match self.state {
            SessionState::Recognizing => self.recognize(client, data),
            SessionState::LegacyPing => {
                let chunk = std::mem::take(data);
                if let Err(err) = self.responder.respond(client, &mut self.buffer, chunk) {
                    self.fail(client, err);
                }
                None
            }
            SessionState::Dispatched | SessionState::Closed => None,
        }
    }

    fn recognize(
        &mut self,
        client: &mut dyn ClientConnection,
        data: &mut &[u8],
    ) -> Option<Box<dyn ProtocolHandler>> {
        match self.recognizer.try_recognize(client, &mut self.buffer, data) {
            Recognition::Dispatched(handler) => {
                self.state = SessionState::Dispatched;
                self.buffer.clear();
                Some(handler)
            }
            Recognition::NeedMoreData => None,
            Recognition::LegacyPing => {
                self.state = SessionState::LegacyPing;
                *data = &[];
                if let Err(err) = self.responder.respond(client, &mut self.buffer, &[]) {
                    self.fail(client, err);
                }
                None
            }
            Recognition::Rejected(err) => {
                self.fail(client, err);
                None
            }
        }
    }

    fn fail(&mut self, client: &mut dyn ClientConnection, err: HandshakeError) {
        let reason = err.disconnect_reason();
        if err.should_notify() {
            if let Err(e) = send_disconnect(client, &reason) {
                info!("Failed to notify {} of disconnect: {}", client.peer(), e);
            }
        }
        info!("Kicking {}: {}", client.peer(), reason.replace('\n', " "));
        client.kick(&reason);
        self.buffer.clear();
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MemoryClient, VersionTable};
    use crate::protocol::{
        next_packet, FrameStatus, Handshake, Intent, PacketBuilder, PING_REQUEST_ID,
        STATUS_REQUEST_ID,
    };
    use crate::recognizer::RecognizerConfig;
    use crate::status::StaticServerInfo;

    struct Probe {
        version: u32,
    }

    impl ProtocolHandler for Probe {
        fn version(&self) -> u32 {
            self.version
        }

        fn initialize(&mut self, _client: &mut dyn ClientConnection) {}

        fn data_received(&mut self, _client: &mut dyn ClientConnection, _data: &[u8]) {}
    }

    fn session_with(config: RecognizerConfig) -> HandshakeSession {
        let table = VersionTable::with_all(|version, _hs: Handshake| Probe {
            version: version.wire(),
        });
        let recognizer = Arc::new(Recognizer::new(Arc::new(table), config));
        let responder = Arc::new(StatusResponder::new(
            Arc::new(StaticServerInfo::new("A game server", 20)),
            recognizer.status_version_name(),
            recognizer.status_protocol(),
        ));
        HandshakeSession::new(recognizer, responder)
    }

    fn session() -> HandshakeSession {
        session_with(RecognizerConfig::default())
    }

    fn packet_ids(bytes: &[u8]) -> Vec<u32> {
        let mut buffer = StagedBuffer::new(1 << 16);
        buffer.write(bytes).unwrap();
        let mut ids = Vec::new();
        while let Ok(FrameStatus::Ready(bounds)) = next_packet(&mut buffer) {
            ids.push(buffer.read_varint().unwrap());
            let rest = bounds.remaining(&buffer);
            buffer.skip(rest).unwrap();
            buffer.commit();
        }
        ids
    }

    #[test]
    fn test_dispatch_then_ignore() {
        let mut s = session();
        let mut client = MemoryClient::new("peer");
        let packet = Handshake::new(340, "localhost", 25565, Intent::Login).encode();

        let mut data: &[u8] = &packet;
        let handler = s.on_data(&mut client, &mut data).unwrap();
        assert_eq!(handler.version(), 340);
        assert_eq!(s.state(), SessionState::Dispatched);

        let mut more: &[u8] = &[1, 2, 3];
        assert!(s.on_data(&mut client, &mut more).is_none());
        assert_eq!(more, &[1, 2, 3]);
    }

    #[test]
    fn test_legacy_ping_conversation() {
        let mut s = session();
        let mut client = MemoryClient::new("peer");
        let mut first = Handshake::new(5, "localhost", 25565, Intent::Status)
            .encode()
            .to_vec();
        first.extend_from_slice(&PacketBuilder::new(STATUS_REQUEST_ID).build());

        let mut data: &[u8] = &first;
        assert!(s.on_data(&mut client, &mut data).is_none());
        assert!(data.is_empty());
        assert_eq!(s.state(), SessionState::LegacyPing);
        assert_eq!(packet_ids(&client.sent_bytes()), vec![0]);

        let ping = PacketBuilder::new(PING_REQUEST_ID).i64(42).build();
        let mut data: &[u8] = &ping;
        assert!(s.on_data(&mut client, &mut data).is_none());
        assert_eq!(packet_ids(&client.sent_bytes()), vec![0, 1]);
        assert!(!client.is_kicked());
    }

    #[test]
    fn test_rejection_sends_notice_and_kicks() {
        let mut s = session();
        let mut client = MemoryClient::new("peer");
        let packet = Handshake::new(5, "localhost", 25565, Intent::Login).encode();

        let mut data: &[u8] = &packet;
        assert!(s.on_data(&mut client, &mut data).is_none());

        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(packet_ids(&client.sent_bytes()), vec![0]);
        assert!(client
            .kick_reason()
            .unwrap()
            .starts_with("Unsupported protocol version 5."));
    }

    #[test]
    fn test_excess_data_kicks() {
        let mut s = session_with(RecognizerConfig {
            max_handshake_bytes: 32,
            ..RecognizerConfig::default()
        });
        let mut client = MemoryClient::new("peer");
        let junk = [0x7fu8; 40];

        let mut data: &[u8] = &junk[..20];
        assert!(s.on_data(&mut client, &mut data).is_none());
        assert_eq!(s.state(), SessionState::Recognizing);

        let mut data: &[u8] = &junk[20..];
        assert!(s.on_data(&mut client, &mut data).is_none());
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(
            client.kick_reason(),
            Some("Your client sent too much data; please try again later.")
        );
    }

    #[test]
    fn test_malformed_legacy_packet_kicks() {
        let mut s = session();
        let mut client = MemoryClient::new("peer");
        let hs = Handshake::new(5, "localhost", 25565, Intent::Status).encode();
        let mut data: &[u8] = &hs;
        s.on_data(&mut client, &mut data);

        let bogus = PacketBuilder::new(0x07).build();
        let mut data: &[u8] = &bogus;
        s.on_data(&mut client, &mut data);

        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(
            client.kick_reason(),
            Some("Server list ping failed, unrecognized packet.")
        );
    }
}
