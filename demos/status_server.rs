//! Minimal server: logs every handshake and answers status for the rest.
//!
//! ```text
//! RUST_LOG=debug cargo run --example status_server -- 127.0.0.1:25565
//! ```
//!
//! Clients on 1.8 through 1.12.2 get a logging handler; everything else that
//! only pings gets the built-in status response.

use mc_handshake::{
    ClientConnection, Handshake, ProtocolHandler, ProtocolVersion, Server, StaticServerInfo,
    StatusFields, VersionTable,
};
use tracing_subscriber::EnvFilter;

/// Counts bytes after the handshake and otherwise ignores them.
struct LoggingProtocol {
    version: ProtocolVersion,
    handshake: Handshake,
    received: usize,
}

impl ProtocolHandler for LoggingProtocol {
    fn version(&self) -> u32 {
        self.version.wire()
    }

    fn initialize(&mut self, client: &mut dyn ClientConnection) {
        tracing::info!(
            "{} connected with {} to {}:{} ({:?})",
            client.peer(),
            self.version,
            self.handshake.server_address,
            self.handshake.server_port,
            self.handshake.intent
        );
    }

    fn data_received(&mut self, client: &mut dyn ClientConnection, data: &[u8]) {
        self.received += data.len();
        tracing::debug!("{} sent {} bytes ({} total)", client.peer(), data.len(), self.received);
    }
}

struct Greeting;

impl mc_handshake::PingHook for Greeting {
    fn on_server_ping(&self, peer: &str, status: &mut StatusFields) {
        status.description = format!("{} (you are {})", status.description, peer);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:25565".to_string());

    let mut versions = VersionTable::with_all(|version, handshake| LoggingProtocol {
        version,
        handshake,
        received: 0,
    });
    versions.unregister(ProtocolVersion::V1_13);

    let server = Server::builder()
        .versions(versions)
        .server_info(StaticServerInfo::new("A handshake demo", 20))
        .ping_hook(Greeting)
        .max_connections(64)
        .bind(addr)
        .await?;

    tracing::info!("Ready on {}", server.local_addr()?);
    server.serve().await?;
    Ok(())
}
