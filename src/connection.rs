//! Connection runtime.
//!
//! One task per client connection:
//! 1. Split the stream and spawn the writer task
//! 2. Feed every read into a [`HandshakeSession`]
//! 3. Once a handler is returned, forward every further read to it
//! 4. Stop on EOF, read error, or kick, then drain the writer
//!
//! ```ignore
//! let summary = run_connection(stream, peer, recognizer, responder, ConnectionConfig::default()).await?;
//! tracing::debug!("{} spoke protocol {:?}", summary.peer, summary.protocol_version);
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error};

use crate::error::{HandshakeError, Result};
use crate::handler::{ClientConnection, ProtocolHandler};
use crate::recognizer::Recognizer;
use crate::session::{HandshakeSession, SessionState};
use crate::status::StatusResponder;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Default socket read size, half the default handshake staging capacity.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Per-connection I/O settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Outbound queue settings.
    pub writer: WriterConfig,
    /// Size of each socket read.
    ///
    /// Every read made before a handler takes over is staged whole, so
    /// this plus a partial handshake must fit in
    /// [`RecognizerConfig::max_handshake_bytes`](crate::RecognizerConfig::max_handshake_bytes),
    /// or a client that sends its handshake together with a large first
    /// burst is kicked for excess data.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            writer: WriterConfig::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// [`ClientConnection`] backed by the writer task.
#[derive(Debug)]
pub struct ChannelClient {
    peer: String,
    writer: WriterHandle,
    protocol_version: Option<u32>,
    kicked: Option<String>,
}

impl ChannelClient {
    /// Wrap a writer handle.
    pub fn new(peer: impl Into<String>, writer: WriterHandle) -> Self {
        Self {
            peer: peer.into(),
            writer,
            protocol_version: None,
            kicked: None,
        }
    }

    /// Declared protocol version, once the handshake parsed.
    pub fn protocol_version(&self) -> Option<u32> {
        self.protocol_version
    }

    /// Kick reason, if kicked.
    pub fn kick_reason(&self) -> Option<&str> {
        self.kicked.as_deref()
    }

    /// Whether the connection should be torn down.
    pub fn is_closed(&self) -> bool {
        self.kicked.is_some()
    }
}

impl ClientConnection for ChannelClient {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn send_data(&mut self, data: Bytes) -> Result<()> {
        if self.kicked.is_some() {
            return Err(HandshakeError::ConnectionClosed);
        }
        self.writer.try_send(data)
    }

    fn kick(&mut self, reason: &str) {
        self.kicked.get_or_insert_with(|| reason.to_string());
    }

    fn set_protocol_version(&mut self, version: u32) {
        self.protocol_version = Some(version);
    }
}

/// What happened on a finished connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Peer address.
    pub peer: String,
    /// Protocol version the client declared, if its handshake parsed.
    pub protocol_version: Option<u32>,
    /// Version of the handler that took over, if any.
    pub handler_version: Option<u32>,
    /// Final session state.
    pub state: SessionState,
    /// Kick reason, if the connection was kicked.
    pub kick_reason: Option<String>,
}

/// Drive one client connection to completion.
///
/// # Errors
///
/// Returns read errors from the stream. A kick is a normal outcome and is
/// reported through [`ConnectionSummary::kick_reason`].
pub async fn run_connection<S>(
    stream: S,
    peer: String,
    recognizer: Arc<Recognizer>,
    responder: Arc<StatusResponder>,
    config: ConnectionConfig,
) -> Result<ConnectionSummary>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, write_half) = tokio::io::split(stream);
    let (writer, writer_task) = spawn_writer_task(write_half, config.writer.clone());

    let mut client = ChannelClient::new(peer, writer);
    let mut session = HandshakeSession::new(recognizer, responder);
    let mut handler: Option<Box<dyn ProtocolHandler>> = None;

    let result = read_loop(
        &mut reader,
        &mut client,
        &mut session,
        &mut handler,
        config.read_buffer_size,
    )
    .await;

    let summary = ConnectionSummary {
        peer: client.peer.clone(),
        protocol_version: client.protocol_version,
        handler_version: handler.as_ref().map(|h| h.version()),
        state: session.state(),
        kick_reason: client.kicked.clone(),
    };

    // Dropping the last handle lets the writer drain and shut down.
    drop(handler);
    drop(client);
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Writer for {} stopped: {}", summary.peer, e),
        Err(e) => error!("Writer task for {} panicked: {}", summary.peer, e),
    }

    result.map(|()| summary)
}

async fn read_loop<R>(
    reader: &mut R,
    client: &mut ChannelClient,
    session: &mut HandshakeSession,
    handler: &mut Option<Box<dyn ProtocolHandler>>,
    read_buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_buffer_size.max(1)];

    while !client.is_closed() {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Client {} closed the connection", client.peer());
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => return Err(HandshakeError::Io(e)),
        };

        let mut data: &[u8] = &buf[..n];
        if let Some(h) = handler.as_mut() {
            h.data_received(client, data);
            continue;
        }

        if let Some(mut h) = session.on_data(client, &mut data) {
            if !data.is_empty() {
                h.data_received(client, data);
            }
            *handler = Some(h);
        }
    }

    Ok(())
}
