//! Dedicated writer task for outbound packets.
//!
//! Callers enqueue logical IBIOS messages through a cloneable
//! [`WriterHandle`]; a single task drains the queue, splits each message into
//! 8-byte packets and writes them one at a time, each gated on clear-to-send.
//!
//! # Architecture
//!
//! ```text
//! Session 1 ─┐
//! Session 2 ─┼─► mpsc::UnboundedSender<Batch> ─► Writer Task ─► CTS ─► Transport
//! Session N ─┘
//! ```
//!
//! A batch is one queue item: its messages are written back to back, so a
//! staged command and its transmit trigger never interleave with another
//! session's frames. Nothing confirms a packet beyond the CTS hint and a
//! failed write is not retried.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{PlcError, Result};
use crate::flow::{ClearToSend, DEFAULT_POLL_INTERVAL};
use crate::protocol::packetize;
use crate::transport::Transport;

/// Logical messages written back to back.
type Batch = Vec<Bytes>;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Fallback interval for re-checking CTS and the running flag.
    pub poll_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Handle for queueing messages to the writer task.
///
/// This is cheaply cloneable and can be shared across sessions.
#[derive(Clone)]
pub struct WriterHandle {
    /// Channel sender for batches.
    tx: mpsc::UnboundedSender<Batch>,
    /// Messages queued but not yet fully written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    fn new(tx: mpsc::UnboundedSender<Batch>, pending: Arc<AtomicUsize>) -> Self {
        Self { tx, pending }
    }

    /// Queue one logical message.
    pub fn send(&self, message: impl Into<Bytes>) -> Result<()> {
        self.send_batch(vec![message.into()])
    }

    /// Queue several messages to be written without interleaving.
    ///
    /// Empty messages are rejected before anything is queued.
    pub fn send_batch<I, M>(&self, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = M>,
        M: Into<Bytes>,
    {
        let batch: Batch = messages.into_iter().map(Into::into).collect();
        if batch.is_empty() || batch.iter().any(|m| m.is_empty()) {
            return Err(PlcError::InvalidArgument(
                "cannot send an empty message".to_string(),
            ));
        }

        let count = batch.len();
        // Increment pending count BEFORE sending
        self.pending.fetch_add(count, Ordering::AcqRel);
        self.tx.send(batch).map_err(|_| {
            self.pending.fetch_sub(count, Ordering::Release);
            PlcError::ConnectionClosed
        })
    }

    /// Get the number of messages not yet fully written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Check whether the writer task has gone away.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for queueing messages.
///
/// # Arguments
///
/// * `transport` - Where packets are written
/// * `cts` - Clear-to-send flag fed by the reader
/// * `running` - Shared flag; the task exits once it is cleared
/// * `config` - Writer configuration
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)`. The task ends with an error if a
/// write fails, after clearing `running`.
pub fn spawn_writer_task<T>(
    transport: Arc<T>,
    cts: Arc<ClearToSend>,
    running: Arc<AtomicBool>,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    T: Transport + ?Sized,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(tx, pending.clone());
    let task = tokio::spawn(writer_loop(rx, transport, cts, running, pending, config));

    (handle, task)
}

/// Main writer loop - drains batches and writes their packets.
async fn writer_loop<T>(
    mut rx: mpsc::UnboundedReceiver<Batch>,
    transport: Arc<T>,
    cts: Arc<ClearToSend>,
    running: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    config: WriterConfig,
) -> Result<()>
where
    T: Transport + ?Sized,
{
    while running.load(Ordering::Acquire) {
        let batch = match tokio::time::timeout(config.poll_interval, rx.recv()).await {
            Ok(Some(batch)) => batch,
            // Every handle dropped, clean shutdown
            Ok(None) => break,
            Err(_) => continue,
        };

        let total = batch.len();
        for (i, message) in batch.iter().enumerate() {
            match write_message(message, &transport, &cts, &running, &config).await {
                Ok(true) => {
                    pending.fetch_sub(1, Ordering::Release);
                }
                Ok(false) => {
                    release_unwritten(&pending, total - i);
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!("Writer task failed: {}", e);
                    release_unwritten(&pending, total - i);
                    running.store(false, Ordering::Release);
                    return Err(e);
                }
            }
        }
    }

    tracing::debug!("Writer task stopped");
    Ok(())
}

/// Drop the rest of a batch that will never be written.
fn release_unwritten(pending: &AtomicUsize, count: usize) {
    pending.fetch_sub(count, Ordering::Release);
    tracing::debug!("Writer stopped with {} unwritten message(s) in batch", count);
}

/// Write every packet of one message. Returns `Ok(false)` if stopped midway.
async fn write_message<T>(
    message: &[u8],
    transport: &Arc<T>,
    cts: &ClearToSend,
    running: &AtomicBool,
    config: &WriterConfig,
) -> Result<bool>
where
    T: Transport + ?Sized,
{
    tracing::debug!("Sending message {:02x?}", message);

    for packet in packetize(message) {
        if !wait_clear_to_send(cts, running, config.poll_interval).await {
            return Ok(false);
        }

        let transport = transport.clone();
        tokio::task::spawn_blocking(move || transport.write(&packet))
            .await
            .map_err(|e| PlcError::Task(e.to_string()))??;

        tracing::trace!("Wrote packet {:02x?}", packet);
    }
    Ok(true)
}

/// Wait for CTS, giving up once the running flag is cleared.
async fn wait_clear_to_send(cts: &ClearToSend, running: &AtomicBool, poll: Duration) -> bool {
    loop {
        if tokio::time::timeout(poll, cts.acquire(poll)).await.is_ok() {
            return true;
        }
        if !running.load(Ordering::Acquire) {
            return false;
        }
    }
}
