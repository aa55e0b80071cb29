//! Handshake recognizer.
//!
//! Accumulates a client's first bytes, frames the handshake packet, and
//! either builds the version handler for it or says why it cannot.
//!
//! One call is one bounded, synchronous attempt. It never waits for the
//! network: if the packet is incomplete the buffer is rolled back to its
//! commit mark and [`Recognition::NeedMoreData`] is returned, and the next
//! call re-parses from the same starting point.
//!
//! # Example
//!
//! ```ignore
//! use mc_handshake::{Recognition, Recognizer, RecognizerConfig};
//!
//! let recognizer = Recognizer::new(table, RecognizerConfig::default());
//! let mut buffer = recognizer.new_buffer();
//!
//! let mut data: &[u8] = &chunk;
//! match recognizer.try_recognize(&mut client, &mut buffer, &mut data) {
//!     Recognition::Dispatched(mut handler) => handler.data_received(&mut client, data),
//!     Recognition::NeedMoreData => {}
//!     Recognition::LegacyPing => { /* hand the buffer to the status responder */ }
//!     Recognition::Rejected(err) => send_disconnect(&mut client, &err.disconnect_reason()),
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{HandshakeError, Result};
use crate::handler::{ClientConnection, ProtocolHandler, VersionTable};
use crate::protocol::{
    next_packet, FrameStatus, Handshake, Intent, PacketBounds, PacketBuilder, ReadError,
    StagedBuffer, DEFAULT_MAX_HANDSHAKE_BYTES, DEFAULT_MAX_STRING_LENGTH, DISCONNECT_PACKET_ID,
    HANDSHAKE_PACKET_ID,
};
use crate::status::disconnect_json;

/// Default prefix of `version.name` in status responses.
pub const DEFAULT_BRAND: &str = "Server";

/// Recognizer settings.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Staging capacity; a client that sends more before completing a
    /// handshake is kicked.
    pub max_handshake_bytes: usize,
    /// Longest server address accepted, in bytes.
    pub max_string_length: usize,
    /// Prefix of the status `version.name`, followed by the client range.
    pub brand: String,
    /// Status `version.protocol`; `None` uses the newest registered version.
    pub latest_protocol: Option<u32>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            max_handshake_bytes: DEFAULT_MAX_HANDSHAKE_BYTES,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            brand: DEFAULT_BRAND.to_string(),
            latest_protocol: None,
        }
    }
}

/// Outcome of one recognition attempt.
pub enum Recognition {
    /// A handler was built and initialized. The data view now starts at the
    /// first byte after the handshake packet.
    Dispatched(Box<dyn ProtocolHandler>),
    /// The handshake is not fully buffered yet.
    NeedMoreData,
    /// Unknown version, but the client only wants server status. The staged
    /// buffer holds whatever followed the handshake.
    LegacyPing,
    /// Fatal; the connection must be closed.
    Rejected(HandshakeError),
}

impl std::fmt::Debug for Recognition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recognition::Dispatched(handler) => f
                .debug_tuple("Dispatched")
                .field(&handler.version())
                .finish(),
            Recognition::NeedMoreData => f.write_str("NeedMoreData"),
            Recognition::LegacyPing => f.write_str("LegacyPing"),
            Recognition::Rejected(err) => f.debug_tuple("Rejected").field(err).finish(),
        }
    }
}

/// Turns a client's first packet into a version handler.
#[derive(Debug)]
pub struct Recognizer {
    /// Shared dispatch table.
    table: Arc<VersionTable>,
    /// Settings.
    config: RecognizerConfig,
    /// Cached client release range, e.g. "1.8.x-1.12.x".
    client_versions: String,
}

impl Recognizer {
    /// Create a recognizer over a dispatch table.
    pub fn new(table: Arc<VersionTable>, config: RecognizerConfig) -> Self {
        let client_versions = table.client_versions_text();
        Self {
            table,
            config,
            client_versions,
        }
    }

    /// Settings.
    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Dispatch table.
    pub fn table(&self) -> &Arc<VersionTable> {
        &self.table
    }

    /// Client release range this server accepts.
    pub fn client_versions(&self) -> &str {
        &self.client_versions
    }

    /// `version.name` for status responses.
    pub fn status_version_name(&self) -> String {
        format!("{} {}", self.config.brand, self.client_versions)
    }

    /// `version.protocol` for status responses.
    pub fn status_protocol(&self) -> u32 {
        self.config
            .latest_protocol
            .or_else(|| self.table.latest().map(|v| v.wire()))
            .unwrap_or(0)
    }

    /// A staging buffer sized for this recognizer.
    pub fn new_buffer(&self) -> StagedBuffer {
        StagedBuffer::new(self.config.max_handshake_bytes)
    }

    /// Stage `data` and make one recognition attempt.
    ///
    /// On [`Recognition::Dispatched`] the handshake packet is committed out of
    /// `buffer` and `data` is narrowed to the bytes that followed it, which
    /// belong to the new handler. On every other outcome `data` is left as is.
    pub fn try_recognize(
        &self,
        client: &mut dyn ClientConnection,
        buffer: &mut StagedBuffer,
        data: &mut &[u8],
    ) -> Recognition {
        if buffer.write(*data).is_err() {
            info!(
                "Client {} sent {} bytes without completing a handshake",
                client.peer(),
                buffer.used() + data.len()
            );
            return Recognition::Rejected(HandshakeError::ExcessHandshakeData);
        }

        let bounds = match next_packet(buffer) {
            Ok(FrameStatus::Ready(bounds)) => bounds,
            Ok(_) => return Recognition::NeedMoreData,
            Err(_) => return Recognition::Rejected(HandshakeError::MalformedHandshake),
        };

        let handshake = match self.read_handshake(client, buffer, bounds) {
            Ok(handshake) => handshake,
            Err(err) => return Recognition::Rejected(err),
        };

        client.set_protocol_version(handshake.protocol_version);

        // Everything past the declared packet end came with the latest chunk
        // and belongs to whoever handles the connection next.
        let tail = buffer.used() - bounds.end;

        if self.table.contains(handshake.protocol_version) {
            let _ = buffer.skip(buffer.readable());
            buffer.commit();
            *data = &data[data.len().saturating_sub(tail)..];

            let version = handshake.protocol_version;
            return match self.table.construct(handshake) {
                Some(mut handler) => {
                    debug!(
                        "Client {} recognized as protocol {} ({})",
                        client.peer(),
                        version,
                        self.table.version_name(version).unwrap_or("?")
                    );
                    handler.initialize(client);
                    Recognition::Dispatched(handler)
                }
                None => Recognition::Rejected(self.unsupported_login(version)),
            };
        }

        debug!(
            "Client {} uses an unsupported protocol (version {} (0x{:x}), next state {})",
            client.peer(),
            handshake.protocol_version,
            handshake.protocol_version,
            handshake.intent.as_raw()
        );

        if handshake.intent != Intent::Status {
            return Recognition::Rejected(self.unsupported_login(handshake.protocol_version));
        }

        // Drop only the handshake; queued status requests stay staged.
        let _ = buffer.skip(bounds.end - buffer.consumed());
        buffer.commit();
        Recognition::LegacyPing
    }

    fn read_handshake(
        &self,
        client: &dyn ClientConnection,
        buffer: &mut StagedBuffer,
        bounds: PacketBounds,
    ) -> Result<Handshake> {
        if bounds.length == 0 {
            return Err(HandshakeError::MalformedHandshake);
        }

        let packet_type = buffer
            .read_varint()
            .map_err(|_| HandshakeError::MalformedHandshake)?;
        if bounds.overrun(buffer) {
            return Err(HandshakeError::MalformedHandshake);
        }
        if packet_type != HANDSHAKE_PACKET_ID {
            info!(
                "Client {} uses an unsupported protocol (lengthed, initial packet {})",
                client.peer(),
                packet_type
            );
            return Err(HandshakeError::UnsupportedHandshakeShape {
                packet_type,
                supported: self.client_versions.clone(),
            });
        }

        let handshake = Handshake::decode_fields(buffer, self.config.max_string_length)
            .map_err(|e: ReadError| {
                debug!("Client {} sent an undecodable handshake: {}", client.peer(), e);
                HandshakeError::MalformedHandshake
            })?;

        if bounds.overrun(buffer) {
            debug!(
                "Client {} handshake fields overran the declared length {}",
                client.peer(),
                bounds.length
            );
            return Err(HandshakeError::MalformedHandshake);
        }

        Ok(handshake)
    }

    fn unsupported_login(&self, version: u32) -> HandshakeError {
        HandshakeError::UnsupportedVersionLogin {
            version,
            supported: self.client_versions.clone(),
        }
    }
}

/// Send a disconnect notice before any version handler exists.
///
/// The notice is framed as a plain packet: varint length, id 0, and the
/// JSON document `{"text":"<reason>"}`.
pub fn send_disconnect<C>(client: &mut C, reason: &str) -> Result<()>
where
    C: ClientConnection + ?Sized,
{
    let json = disconnect_json(reason)?;
    let packet = PacketBuilder::new(DISCONNECT_PACKET_ID)
        .string(&json)
        .build();
    client.send_data(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{MemoryClient, ProtocolVersion};
    use crate::protocol::{Handshake, STATUS_REQUEST_ID};
    use bytes::Bytes;

    struct Probe {
        version: u32,
    }

    impl ProtocolHandler for Probe {
        fn version(&self) -> u32 {
            self.version
        }

        fn initialize(&mut self, client: &mut dyn ClientConnection) {
            let _ = client.send_data(Bytes::from_static(b"init"));
        }

        fn data_received(&mut self, _client: &mut dyn ClientConnection, _data: &[u8]) {}
    }

    fn recognizer_with(config: RecognizerConfig) -> Recognizer {
        let table = VersionTable::with_all(|version, _hs: Handshake| Probe {
            version: version.wire(),
        });
        Recognizer::new(Arc::new(table), config)
    }

    fn recognizer() -> Recognizer {
        recognizer_with(RecognizerConfig::default())
    }

    fn handshake(version: u32, intent: Intent) -> Bytes {
        Handshake::new(version, "localhost", 25565, intent).encode()
    }

    fn feed(
        r: &Recognizer,
        client: &mut MemoryClient,
        buffer: &mut StagedBuffer,
        chunk: &[u8],
    ) -> (Recognition, Vec<u8>) {
        let mut data = chunk;
        let outcome = r.try_recognize(client, buffer, &mut data);
        (outcome, data.to_vec())
    }

    #[test]
    fn test_known_version_dispatches() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();

        let (outcome, rest) = feed(&r, &mut client, &mut buffer, &handshake(47, Intent::Status));

        match outcome {
            Recognition::Dispatched(handler) => assert_eq!(handler.version(), 47),
            other => panic!("expected dispatch, got {:?}", other),
        }
        assert!(rest.is_empty());
        assert!(buffer.is_empty());
        assert_eq!(client.protocol_version(), Some(47));
        assert_eq!(client.sent_bytes(), b"init");
    }

    #[test]
    fn test_trailing_bytes_are_handed_over() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let mut chunk = handshake(340, Intent::Login).to_vec();
        chunk.extend_from_slice(&[0xaa, 0xbb, 0xcc]);

        let (outcome, rest) = feed(&r, &mut client, &mut buffer, &chunk);

        assert!(matches!(outcome, Recognition::Dispatched(_)));
        assert_eq!(rest, vec![0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_partial_handshake_rolls_back() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let packet = handshake(335, Intent::Login);
        let (head, tail) = packet.split_at(7);

        let (outcome, _) = feed(&r, &mut client, &mut buffer, head);
        assert!(matches!(outcome, Recognition::NeedMoreData));
        assert_eq!(buffer.consumed(), 0);
        assert_eq!(buffer.used(), 7);
        assert_eq!(client.protocol_version(), None);

        let (outcome, rest) = feed(&r, &mut client, &mut buffer, tail);
        assert!(matches!(outcome, Recognition::Dispatched(_)));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_tail_split_across_chunks() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let mut stream = handshake(316, Intent::Login).to_vec();
        stream.extend_from_slice(b"xyz");
        let split = stream.len() - 5;

        let (outcome, _) = feed(&r, &mut client, &mut buffer, &stream[..split]);
        assert!(matches!(outcome, Recognition::NeedMoreData));

        let (outcome, rest) = feed(&r, &mut client, &mut buffer, &stream[split..]);
        assert!(matches!(outcome, Recognition::Dispatched(_)));
        assert_eq!(rest, b"xyz");
    }

    #[test]
    fn test_unknown_version_login_rejected() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();

        let (outcome, _) = feed(&r, &mut client, &mut buffer, &handshake(4, Intent::Login));

        match outcome {
            Recognition::Rejected(err) => assert_eq!(
                err.disconnect_reason(),
                "Unsupported protocol version 4.\nTry connecting with Minecraft 1.8.x-1.13.x"
            ),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(client.protocol_version(), Some(4));
    }

    #[test]
    fn test_unknown_version_status_keeps_queued_requests() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let mut chunk = handshake(4, Intent::Status).to_vec();
        chunk.extend_from_slice(&PacketBuilder::new(STATUS_REQUEST_ID).build());

        let (outcome, rest) = feed(&r, &mut client, &mut buffer, &chunk);

        assert!(matches!(outcome, Recognition::LegacyPing));
        assert_eq!(rest, chunk);
        assert_eq!(buffer.peek(), &[0x01, 0x00]);
        assert_eq!(buffer.consumed(), 0);
    }

    #[test]
    fn test_wrong_packet_type_is_unsupported_shape() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let packet = PacketBuilder::new(0x05).varint(47).build();

        let (outcome, _) = feed(&r, &mut client, &mut buffer, &packet);

        assert!(matches!(
            outcome,
            Recognition::Rejected(HandshakeError::UnsupportedHandshakeShape { packet_type: 5, .. })
        ));
    }

    #[test]
    fn test_fields_past_declared_length_are_malformed() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        // Length 3 covers only id, version and the address length.
        let mut chunk = vec![0x03];
        chunk.extend_from_slice(&handshake(47, Intent::Login)[1..]);

        let (outcome, _) = feed(&r, &mut client, &mut buffer, &chunk);

        assert!(matches!(
            outcome,
            Recognition::Rejected(HandshakeError::MalformedHandshake)
        ));
    }

    #[test]
    fn test_truncated_fields_are_malformed() {
        let r = recognizer();
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        // id 0, version 47, address length 9 but no address bytes
        let (outcome, _) = feed(&r, &mut client, &mut buffer, &[0x03, 0x00, 0x2f, 0x09]);

        assert!(matches!(
            outcome,
            Recognition::Rejected(HandshakeError::MalformedHandshake)
        ));
    }

    #[test]
    fn test_zero_length_and_bad_prefix_are_malformed() {
        let r = recognizer();

        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();
        let (outcome, _) = feed(&r, &mut client, &mut buffer, &[0x00, 0x00]);
        assert!(matches!(
            outcome,
            Recognition::Rejected(HandshakeError::MalformedHandshake)
        ));

        let mut buffer = r.new_buffer();
        let (outcome, _) = feed(&r, &mut client, &mut buffer, &[0xff; 6]);
        assert!(matches!(
            outcome,
            Recognition::Rejected(HandshakeError::MalformedHandshake)
        ));
    }

    #[test]
    fn test_overflow_is_excess_data() {
        let r = recognizer_with(RecognizerConfig {
            max_handshake_bytes: 16,
            ..RecognizerConfig::default()
        });
        let mut client = MemoryClient::new("peer");
        let mut buffer = r.new_buffer();

        // Declares a 100 byte body that never fits.
        let (outcome, _) = feed(&r, &mut client, &mut buffer, &[100, 0, 0, 0]);
        assert!(matches!(outcome, Recognition::NeedMoreData));

        let (outcome, _) = feed(&r, &mut client, &mut buffer, &[0u8; 13]);
        match outcome {
            Recognition::Rejected(err) => {
                assert!(matches!(err, HandshakeError::ExcessHandshakeData));
                assert_eq!(
                    err.disconnect_reason(),
                    "Your client sent too much data; please try again later."
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_status_identity() {
        let r = recognizer();
        assert_eq!(r.client_versions(), "1.8.x-1.13.x");
        assert_eq!(r.status_version_name(), "Server 1.8.x-1.13.x");
        assert_eq!(r.status_protocol(), ProtocolVersion::V1_13.wire());

        let r = recognizer_with(RecognizerConfig {
            brand: "Cube".to_string(),
            latest_protocol: Some(340),
            ..RecognizerConfig::default()
        });
        assert_eq!(r.status_version_name(), "Cube 1.8.x-1.13.x");
        assert_eq!(r.status_protocol(), 340);
    }

    #[test]
    fn test_send_disconnect_frames_json() {
        let mut client = MemoryClient::new("peer");
        send_disconnect(&mut client, "bye").unwrap();

        let sent = client.sent_bytes();
        let json = br#"{"text":"bye"}"#;
        assert_eq!(sent[0] as usize, sent.len() - 1);
        assert_eq!(sent[1], 0x00);
        assert_eq!(sent[2] as usize, json.len());
        assert_eq!(&sent[3..], &json[..]);
    }
}
