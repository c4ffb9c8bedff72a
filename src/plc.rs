//! PLC builder and runtime loops.
//!
//! The [`PlcBuilder`] collects configuration; [`PlcBuilder::start`] takes a
//! transport and spawns the two background tasks:
//!
//! ```text
//!            ┌──────────── reader (blocking pool) ────────────┐
//! Transport ─┤ read report ─► CTS hint ─► FrameAssembler ─► Dispatcher ─► filters
//!            │                   │                                        │
//!            └───────────────────┼────────────────────────────────────────┘
//!                                ▼
//!            ◄── write packet ◄─ writer task ◄── WriterHandle ◄── sessions
//! ```
//!
//! Both tasks run until the shared running flag is cleared by
//! [`Plc::shutdown`], by dropping the [`Plc`], or by a transport error.
//!
//! # Example
//!
//! ```no_run
//! use powerlinc::{Plc, Result};
//! use powerlinc::transport::MockTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let plc = Plc::builder().start(MockTransport::new())?;
//!     let dimmer = plc.dimmer("11.22.33".parse()?);
//!
//!     dimmer.set_level(50).await?;
//!     plc.shutdown().await
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::config::PlcConfig;
use crate::dispatch::{Dispatcher, Filter, FilterId};
use crate::error::{PlcError, Result};
use crate::flow::ClearToSend;
use crate::insteon::{Address, Dimmer};
use crate::protocol::{encode_write_memory, FrameAssembler, InboundReport};
use crate::session::CommandSession;
use crate::transport::Transport;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Builder for configuring and starting a PLC connection.
#[derive(Debug, Clone, Default)]
pub struct PlcBuilder {
    config: PlcConfig,
}

impl PlcBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PlcConfig) -> Self {
        self.config = config;
        self
    }

    /// Bytes requested per transport read.
    ///
    /// Default: 8
    pub fn report_size(mut self, size: usize) -> Self {
        self.config.report_size = size;
        self
    }

    /// How long one transport read may block.
    ///
    /// Default: 100 ms
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout_ms = duration_ms(timeout);
        self
    }

    /// Fallback interval for re-checking clear-to-send.
    ///
    /// Default: 100 ms
    pub fn cts_poll_interval(mut self, interval: Duration) -> Self {
        self.config.cts_poll_interval_ms = duration_ms(interval);
        self
    }

    /// How long a command waits for the device's ack.
    ///
    /// Default: 5 seconds
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout_ms = duration_ms(timeout);
        self
    }

    /// Largest inbound frame accepted before the buffer is reset.
    ///
    /// Default: 65 544
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Current configuration.
    pub fn get_config(&self) -> &PlcConfig {
        &self.config
    }

    /// Spawn the reader and writer tasks over `transport`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T: Transport>(self, transport: T) -> Result<Plc> {
        Plc::start(Arc::new(transport), self.config)
    }
}

/// A running PLC connection.
pub struct Plc {
    /// Filters fed by the reader.
    dispatcher: Dispatcher,
    /// Writer handle for queueing messages.
    writer: WriterHandle,
    /// Flow-control hint shared by both tasks.
    cts: Arc<ClearToSend>,
    /// Cleared to stop both tasks.
    running: Arc<AtomicBool>,
    config: PlcConfig,
    reader_task: Option<JoinHandle<Result<()>>>,
    writer_task: Option<JoinHandle<Result<()>>>,
}

impl Plc {
    /// Create a new PLC builder.
    pub fn builder() -> PlcBuilder {
        PlcBuilder::new()
    }

    fn start(transport: Arc<dyn Transport>, config: PlcConfig) -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| PlcError::Task(format!("PLC must start inside a Tokio runtime: {e}")))?;

        let dispatcher = Dispatcher::new();
        let cts = Arc::new(ClearToSend::new());
        let running = Arc::new(AtomicBool::new(true));

        let (writer, writer_task) = spawn_writer_task(
            transport.clone(),
            cts.clone(),
            running.clone(),
            WriterConfig {
                poll_interval: config.cts_poll_interval(),
            },
        );

        let reader_task = {
            let dispatcher = dispatcher.clone();
            let cts = cts.clone();
            let running = running.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || read_loop(transport, dispatcher, cts, running, config))
        };

        tracing::debug!("PLC started: {:?}", config);

        Ok(Self {
            dispatcher,
            writer,
            cts,
            running,
            config,
            reader_task: Some(reader_task),
            writer_task: Some(writer_task),
        })
    }

    /// Open a command session to `address`.
    pub fn session(&self, address: Address) -> CommandSession {
        CommandSession::new(address, self.dispatcher.clone(), self.writer.clone())
            .with_timeout(self.config.command_timeout())
    }

    /// Open a dimmer at `address`.
    pub fn dimmer(&self, address: Address) -> Dimmer {
        Dimmer::new(self.session(address))
    }

    /// Append a filter to the inbound frame chain.
    pub fn register_filter<F: Filter>(&self, filter: F) -> FilterId {
        self.dispatcher.register(filter)
    }

    /// Remove a filter. Returns `false` if it was not registered.
    pub fn unregister_filter(&self, id: FilterId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// The inbound frame dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Queue a write-memory frame storing `payload` at `location`.
    pub fn write_memory(&self, location: u16, payload: &[u8]) -> Result<()> {
        self.writer.send(encode_write_memory(location, payload)?)
    }

    /// Queue a raw IBIOS message.
    pub fn enqueue(&self, message: impl Into<Bytes>) -> Result<()> {
        self.writer.send(message)
    }

    /// Current clear-to-send hint.
    pub fn is_clear_to_send(&self) -> bool {
        self.cts.is_clear()
    }

    /// Whether the background tasks are still meant to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Messages queued but not yet fully written.
    pub fn pending_messages(&self) -> usize {
        self.writer.pending_count()
    }

    /// The active configuration.
    pub fn config(&self) -> &PlcConfig {
        &self.config
    }

    /// Stop both tasks and wait for them to finish.
    ///
    /// Returns the first error a task ended with, if any.
    pub async fn shutdown(mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);

        let reader = join_task(self.reader_task.take()).await;
        let writer = join_task(self.writer_task.take()).await;
        tracing::debug!("PLC stopped");

        reader.and(writer)
    }
}

impl Drop for Plc {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

async fn join_task(task: Option<JoinHandle<Result<()>>>) -> Result<()> {
    match task {
        Some(task) => task.await.map_err(|e| PlcError::Task(e.to_string()))?,
        None => Ok(()),
    }
}

/// Reader loop - polls the transport and dispatches complete frames.
///
/// Runs on the blocking pool. Frames are published inline, so a slow filter
/// delays every following read.
fn read_loop(
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    cts: Arc<ClearToSend>,
    running: Arc<AtomicBool>,
    config: PlcConfig,
) -> Result<()> {
    let mut assembler = FrameAssembler::with_max_frame_len(config.max_frame_len);
    let timeout = config.read_timeout();

    while running.load(Ordering::Acquire) {
        let data = match transport.read(config.report_size, timeout) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Transport read failed: {}", e);
                running.store(false, Ordering::Release);
                return Err(PlcError::Io(e));
            }
        };

        let Some(report) = InboundReport::parse(&data) else {
            // Nothing pending on the modem side
            cts.set();
            continue;
        };

        if report.clear_to_send {
            cts.set();
        } else {
            cts.clear();
        }

        for frame in assembler.push(report.payload) {
            tracing::debug!("Dispatching frame {:02x?}", frame.as_bytes());
            dispatcher.publish(frame);
        }
    }

    tracing::debug!("Reader task stopped");
    Ok(())
}
