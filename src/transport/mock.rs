//! In-memory modem double.
//!
//! Inbound reports are queued and handed out one per `read`, a blocked read
//! is woken by a `Condvar` as soon as a report is queued. Every written packet
//! is recorded and, if a responder is installed, passed to it so it can queue
//! the modem's reply.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use powerlinc::transport::{MockTransport, Transport};
//!
//! let mock = MockTransport::new();
//! mock.push_frame(&[0x02, 0x45, 0x06]);
//!
//! let report = mock.read(8, Duration::from_millis(10)).unwrap();
//! assert_eq!(&report[..4], &[0x03, 0x02, 0x45, 0x06]);
//! assert!(mock.read(8, Duration::from_millis(1)).unwrap().is_empty());
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::Transport;
use crate::protocol::{report_chunks, InboundReport, PACKET_SIZE};

/// Callback run for every written packet; returns reports to queue for reading.
pub type Responder = Arc<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct State {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    responder: Option<Responder>,
    /// Once set, every read and write fails with `BrokenPipe`.
    disconnected: bool,
}

/// Scriptable in-memory [`Transport`].
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
    readable: Condvar,
}

impl MockTransport {
    /// Create a transport with nothing queued and no responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that answers written packets with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install or replace the responder.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        self.state().responder = Some(Arc::new(responder));
    }

    /// Queue one raw inbound report.
    pub fn push_report(&self, report: impl Into<Vec<u8>>) {
        self.state().inbound.push_back(report.into());
        self.readable.notify_all();
    }

    /// Queue an IBIOS frame, split into reports the way the modem sends it.
    pub fn push_frame(&self, frame: &[u8]) {
        let mut state = self.state();
        state.inbound.extend(report_chunks(frame));
        drop(state);
        self.readable.notify_all();
    }

    /// Every packet written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state().written.clone()
    }

    /// The logical byte stream carried by the written packets.
    pub fn written_stream(&self) -> Vec<u8> {
        self.state()
            .written
            .iter()
            .filter_map(|p| InboundReport::parse(p).map(|r| r.payload.to_vec()))
            .flatten()
            .collect()
    }

    /// Forget recorded packets.
    pub fn clear_written(&self) {
        self.state().written.clear();
    }

    /// Number of reports waiting to be read.
    pub fn pending_reports(&self) -> usize {
        self.state().inbound.len()
    }

    /// Simulate the device going away.
    pub fn disconnect(&self) {
        self.state().disconnected = true;
        self.readable.notify_all();
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "mock device disconnected")
}

impl Transport for MockTransport {
    fn read(&self, max_len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            if state.disconnected {
                return Err(broken_pipe());
            }
            if let Some(mut report) = state.inbound.pop_front() {
                report.truncate(max_len);
                return Ok(report);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            state = self
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn write(&self, packet: &[u8]) -> io::Result<()> {
        let responder = {
            let mut state = self.state();
            if state.disconnected {
                return Err(broken_pipe());
            }
            if packet.len() != PACKET_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("packet of {} bytes, expected {}", packet.len(), PACKET_SIZE),
                ));
            }
            state.written.push(packet.to_vec());
            state.responder.clone()
        };

        if let Some(responder) = responder {
            let replies = responder(packet);
            if !replies.is_empty() {
                self.state().inbound.extend(replies);
                self.readable.notify_all();
            }
        }
        Ok(())
    }
}
