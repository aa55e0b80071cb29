//! Dedicated writer task for outbound packets.
//!
//! Recognition and handlers run synchronously and must never wait on the
//! socket, so outgoing packets are queued on an mpsc channel and written by
//! a separate task:
//!
//! ```text
//! recognizer ─┐
//! responder  ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► socket write half
//! handler    ─┘
//! ```
//!
//! Ready packets are batched into a single vectored write. The task exits
//! once every [`WriterHandle`] is dropped and the queue is drained.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{HandshakeError, Result};

/// Default maximum queued packets before sends are refused.
pub const DEFAULT_MAX_PENDING_PACKETS: usize = 256;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Maximum packets written in one batch.
const MAX_BATCH_SIZE: usize = 64;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum queued packets; further sends fail fast.
    pub max_pending_packets: usize,
    /// Channel capacity for the packet queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_packets: DEFAULT_MAX_PENDING_PACKETS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for queueing packets on the writer task.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    /// Queued packets not yet written.
    pending: Arc<AtomicUsize>,
    max_pending: usize,
}

impl WriterHandle {
    /// Queue a packet without waiting.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::OutboundQueueFull`] when the pending bound or the
    /// channel is full, [`HandshakeError::ConnectionClosed`] once the writer
    /// task has stopped.
    pub fn try_send(&self, packet: Bytes) -> Result<()> {
        let current = self.pending.load(Ordering::Acquire);
        if current >= self.max_pending {
            return Err(HandshakeError::OutboundQueueFull { pending: current });
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.try_send(packet).map_err(|e| {
            let pending = self.pending.fetch_sub(1, Ordering::Release) - 1;
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    HandshakeError::OutboundQueueFull { pending }
                }
                mpsc::error::TrySendError::Closed(_) => HandshakeError::ConnectionClosed,
            }
        })
    }

    /// Whether the pending bound is reached.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Queued packets not yet written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task.
///
/// Returns the sending handle and the task, which resolves once the queue is
/// drained after the last handle is dropped, or on the first write error.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: Arc::clone(&pending),
        max_pending: config.max_pending_packets,
    };

    let task = tokio::spawn(writer_loop(rx, writer, pending));
    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<Bytes>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(packet) => batch.push(packet),
                Err(_) => break,
            }
        }

        let count = batch.len();
        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Writer task failed: {}", e);
            rx.close();
            return Err(e);
        }
        pending.fetch_sub(count, Ordering::Release);
        batch.clear();
    }

    // Best effort: the peer may already be gone.
    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = batch.iter().map(Bytes::len).sum();
    let mut written = 0;

    while written < total {
        let slices = remaining_slices(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(HandshakeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// IoSlices covering everything after the first `skip` bytes of the batch.
fn remaining_slices(batch: &[Bytes], skip: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for packet in batch {
        let end = offset + packet.len();
        if skip < end && !packet.is_empty() {
            slices.push(IoSlice::new(&packet[skip.saturating_sub(offset)..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_remaining_slices_skips_written_bytes() {
        let batch = vec![
            Bytes::from_static(b"abc"),
            Bytes::new(),
            Bytes::from_static(b"defg"),
        ];

        let all: Vec<u8> = remaining_slices(&batch, 0)
            .iter()
            .flat_map(|s| s.iter().copied())
            .collect();
        assert_eq!(all, b"abcdefg");

        let rest: Vec<u8> = remaining_slices(&batch, 4)
            .iter()
            .flat_map(|s| s.iter().copied())
            .collect();
        assert_eq!(rest, b"efg");

        assert!(remaining_slices(&batch, 7).is_empty());
    }

    #[tokio::test]
    async fn test_writer_delivers_in_order() {
        let (client, mut server) = duplex(1024);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        handle.try_send(Bytes::from_static(b"hello ")).unwrap();
        handle.try_send(Bytes::from_static(b"world")).unwrap();
        drop(handle);

        task.await.unwrap().unwrap();

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_pending_bound_refuses_sends() {
        // A tiny pipe nobody reads keeps the writer blocked.
        let (client, _server) = duplex(1);
        let (handle, _task) = spawn_writer_task(
            client,
            WriterConfig {
                max_pending_packets: 2,
                channel_capacity: 8,
            },
        );

        handle.try_send(Bytes::from_static(b"aaaa")).unwrap();
        handle.try_send(Bytes::from_static(b"bbbb")).unwrap();

        assert!(handle.is_backpressure_active());
        assert!(matches!(
            handle.try_send(Bytes::from_static(b"cccc")),
            Err(HandshakeError::OutboundQueueFull { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_writer_reports_connection_closed() {
        let (client, server) = duplex(64);
        drop(server);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        handle.try_send(Bytes::from_static(b"x")).unwrap();
        assert!(task.await.unwrap().is_err());

        assert!(handle.is_closed());
        assert!(matches!(
            handle.try_send(Bytes::from_static(b"y")),
            Err(HandshakeError::ConnectionClosed) | Err(HandshakeError::OutboundQueueFull { .. })
        ));
    }
}
