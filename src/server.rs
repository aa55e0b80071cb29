//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] collects the version table, the server registry,
//! an optional ping hook and the limits, then binds a TCP listener. The
//! [`Server`] accepts clients and runs each one in its own task:
//!
//! ```ignore
//! use mc_handshake::{ProtocolVersion, Server, StaticServerInfo, VersionTable};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .versions(VersionTable::with_all(|version, hs| MyProtocol::new(version, hs)))
//!         .server_info(StaticServerInfo::new("A game server", 20))
//!         .max_connections(512)
//!         .bind("0.0.0.0:25565")
//!         .await?;
//!
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::connection::{run_connection, ConnectionConfig};
use crate::error::Result;
use crate::handler::VersionTable;
use crate::recognizer::{Recognizer, RecognizerConfig};
use crate::status::{PingHook, ServerInfo, StaticServerInfo, StatusResponder};

/// Default maximum concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Description used when no server registry is configured.
pub const DEFAULT_DESCRIPTION: &str = "A game server";

/// Player limit used when no server registry is configured.
pub const DEFAULT_MAX_PLAYERS: u32 = 20;

/// Builder for configuring and binding a [`Server`].
pub struct ServerBuilder {
    table: VersionTable,
    info: Option<Arc<dyn ServerInfo>>,
    hook: Option<Arc<dyn PingHook>>,
    recognizer_config: RecognizerConfig,
    connection_config: ConnectionConfig,
    max_connections: usize,
}

impl ServerBuilder {
    /// Create a builder with an empty version table.
    pub fn new() -> Self {
        Self {
            table: VersionTable::new(),
            info: None,
            hook: None,
            recognizer_config: RecognizerConfig::default(),
            connection_config: ConnectionConfig::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the version dispatch table.
    pub fn versions(mut self, table: VersionTable) -> Self {
        self.table = table;
        self
    }

    /// Set the server registry consulted for status responses.
    pub fn server_info(mut self, info: impl ServerInfo + 'static) -> Self {
        self.info = Some(Arc::new(info));
        self
    }

    /// Share an existing server registry.
    pub fn shared_server_info(mut self, info: Arc<dyn ServerInfo>) -> Self {
        self.info = Some(info);
        self
    }

    /// Install a hook run before every status response.
    pub fn ping_hook(mut self, hook: impl PingHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Replace the whole recognizer configuration.
    pub fn recognizer_config(mut self, config: RecognizerConfig) -> Self {
        self.recognizer_config = config;
        self
    }

    /// Staging capacity per connection before a kick for excess data.
    ///
    /// Default: 8 KiB
    pub fn max_handshake_bytes(mut self, limit: usize) -> Self {
        self.recognizer_config.max_handshake_bytes = limit;
        self
    }

    /// Prefix of the status version name.
    ///
    /// Default: "Server"
    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.recognizer_config.brand = brand.into();
        self
    }

    /// Status `version.protocol`. Defaults to the newest registered version.
    pub fn latest_protocol(mut self, version: u32) -> Self {
        self.recognizer_config.latest_protocol = Some(version);
        self
    }

    /// Replace the whole per-connection I/O configuration.
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection_config = config;
        self
    }

    /// Maximum queued outbound packets per connection.
    ///
    /// Default: 256
    pub fn max_pending_packets(mut self, limit: usize) -> Self {
        self.connection_config.writer.max_pending_packets = limit;
        self
    }

    /// Maximum simultaneous connections; extra clients are dropped on accept.
    ///
    /// Default: 1024
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.max_connections = limit;
        self
    }

    /// Build the shared recognizer and responder without binding.
    pub fn build_parts(self) -> ServerParts {
        let recognizer = Arc::new(Recognizer::new(
            Arc::new(self.table),
            self.recognizer_config,
        ));
        let info = self.info.unwrap_or_else(|| {
            Arc::new(StaticServerInfo::new(DEFAULT_DESCRIPTION, DEFAULT_MAX_PLAYERS))
        });
        let mut responder = StatusResponder::new(
            info,
            recognizer.status_version_name(),
            recognizer.status_protocol(),
        );
        if let Some(hook) = self.hook {
            responder = responder.with_hook(hook);
        }

        ServerParts {
            recognizer,
            responder: Arc::new(responder),
            connection_config: self.connection_config,
            max_connections: self.max_connections,
        }
    }

    /// Bind a TCP listener.
    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> Result<Server> {
        let parts = self.build_parts();
        let listener = TcpListener::bind(addr).await?;
        info!(
            "Listening on {} for clients {} ({} versions)",
            listener.local_addr()?,
            parts.recognizer.client_versions(),
            parts.recognizer.table().len()
        );
        Ok(Server {
            listener,
            semaphore: Arc::new(Semaphore::new(parts.max_connections)),
            parts,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state every connection task receives.
#[derive(Debug, Clone)]
pub struct ServerParts {
    /// Handshake recognizer.
    pub recognizer: Arc<Recognizer>,
    /// Legacy status responder.
    pub responder: Arc<StatusResponder>,
    /// Per-connection I/O settings.
    pub connection_config: ConnectionConfig,
    /// Connection limit.
    pub max_connections: usize,
}

/// A bound server.
pub struct Server {
    listener: TcpListener,
    parts: ServerParts,
    semaphore: Arc<Semaphore>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared state handed to connections.
    pub fn parts(&self) -> &ServerParts {
        &self.parts
    }

    /// Connections that can still be accepted.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Accept clients until the listener fails.
    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;

            let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    warn!(
                        "Connection limit {} reached, dropping client {}",
                        self.parts.max_connections, addr
                    );
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }

            let recognizer = Arc::clone(&self.parts.recognizer);
            let responder = Arc::clone(&self.parts.responder);
            let config = self.parts.connection_config.clone();

            tokio::spawn(async move {
                // Permit is held until the connection ends
                let _permit = permit;

                match run_connection(stream, addr.to_string(), recognizer, responder, config).await
                {
                    Ok(summary) => debug!(
                        "Connection {} finished in state {:?}",
                        summary.peer, summary.state
                    ),
                    Err(e) => tracing::error!("Connection {} failed: {}", addr, e),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ProtocolVersion;
    use crate::protocol::{
        next_packet, FrameStatus, Handshake, Intent, PacketBuilder, StagedBuffer,
        STATUS_REQUEST_ID, STATUS_RESPONSE_ID,
    };
    use crate::status::StatusFields;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_builder_defaults() {
        let parts = ServerBuilder::default().build_parts();

        assert_eq!(parts.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(parts.recognizer.client_versions(), "(none)");
        assert_eq!(parts.responder.version_name(), "Server (none)");
        assert_eq!(parts.responder.latest_protocol(), 0);
    }

    #[test]
    fn test_builder_configuration() {
        let table = VersionTable::new()
            .handler(ProtocolVersion::V1_8, |hs: Handshake| Null(hs.protocol_version))
            .handler(ProtocolVersion::V1_12_2, |hs: Handshake| Null(hs.protocol_version));

        let parts = Server::builder()
            .versions(table)
            .brand("Cube")
            .max_handshake_bytes(512)
            .max_pending_packets(8)
            .max_connections(3)
            .build_parts();

        assert_eq!(parts.max_connections, 3);
        assert_eq!(parts.recognizer.config().max_handshake_bytes, 512);
        assert_eq!(parts.connection_config.writer.max_pending_packets, 8);
        assert_eq!(parts.responder.version_name(), "Cube 1.8.x-1.12.x");
        assert_eq!(parts.responder.latest_protocol(), 340);

        let parts = Server::builder().latest_protocol(47).build_parts();
        assert_eq!(parts.responder.latest_protocol(), 47);
    }

    struct Null(u32);

    impl crate::handler::ProtocolHandler for Null {
        fn version(&self) -> u32 {
            self.0
        }

        fn initialize(&mut self, _client: &mut dyn crate::handler::ClientConnection) {}

        fn data_received(&mut self, _client: &mut dyn crate::handler::ClientConnection, _data: &[u8]) {}
    }

    struct Motd;

    impl PingHook for Motd {
        fn on_server_ping(&self, _peer: &str, status: &mut StatusFields) {
            status.description = "hooked".to_string();
        }
    }

    #[tokio::test]
    async fn test_serve_answers_legacy_status_over_tcp() {
        let server = Server::builder()
            .server_info(StaticServerInfo::new("motd", 5))
            .ping_hook(Motd)
            .bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut request = Handshake::new(47, "127.0.0.1", addr.port(), Intent::Status)
            .encode()
            .to_vec();
        request.extend_from_slice(&PacketBuilder::new(STATUS_REQUEST_ID).build());
        stream.write_all(&request).await.unwrap();

        // Nothing is registered, so 47 takes the legacy path.
        let mut buffer = StagedBuffer::new(1 << 16);
        let mut chunk = [0u8; 1024];
        let json = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "server closed before replying");
            buffer.write(&chunk[..n]).unwrap();
            if let FrameStatus::Ready(_) = next_packet(&mut buffer).unwrap() {
                assert_eq!(buffer.read_varint().unwrap(), STATUS_RESPONSE_ID);
                break buffer.read_utf8(32767).unwrap();
            }
        };

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["description"]["text"], "hooked");
        assert_eq!(parsed["players"]["max"], 5);
        assert_eq!(parsed["version"]["name"], "Server (none)");
    }
}
