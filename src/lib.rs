//! # mc-handshake
//!
//! Handshake layer for a multi-version game server.
//!
//! Inspects the first bytes a client sends, works out which wire protocol
//! version it speaks, builds the matching protocol handler, and hands the
//! rest of the byte stream over to it. Clients on unsupported versions that
//! only want the server list status are answered by a built-in fallback.
//!
//! ## Architecture
//!
//! - **Recognition** (sync): [`Recognizer`] over a per-connection
//!   [`StagedBuffer`], one bounded attempt per arrival of bytes
//! - **Legacy status** (sync): [`StatusResponder`] answers status and ping
//!   requests without a version handler
//! - **Runtime** (tokio): one task per connection plus a writer task;
//!   [`Server`] accepts TCP clients
//!
//! ## Example
//!
//! ```ignore
//! use mc_handshake::{Server, StaticServerInfo, VersionTable};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .versions(VersionTable::with_all(|version, handshake| {
//!             GameProtocol::new(version, handshake)
//!         }))
//!         .server_info(StaticServerInfo::new("A game server", 20))
//!         .bind("0.0.0.0:25565")
//!         .await?;
//!
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod recognizer;
pub mod server;
pub mod session;
pub mod status;
pub mod writer;

pub use connection::{run_connection, ChannelClient, ConnectionConfig, ConnectionSummary};
pub use error::{HandshakeError, Result};
pub use handler::{
    version_text, ClientConnection, MemoryClient, ProtocolHandler, ProtocolVersion, VersionTable,
};
pub use protocol::{Handshake, Intent, StagedBuffer};
pub use recognizer::{send_disconnect, Recognition, Recognizer, RecognizerConfig};
pub use server::{Server, ServerBuilder, ServerParts};
pub use session::{HandshakeSession, SessionState};
pub use status::{PingHook, ServerInfo, StaticServerInfo, StatusFields, StatusResponder};
