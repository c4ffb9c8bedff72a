//! Per-device command sessions.
//!
//! A [`CommandSession`] sends one Insteon command at a time to a fixed
//! address and waits for the device's acknowledgement:
//!
//! ```text
//! send() ──► register reply filter
//!        ──► queue [write-memory 0x01a4 <command>, transmit trigger]
//!        ◄── frames from the reader, until `02 4F 04 <address>` or deadline
//!        ──► unregister filter (guard drop)
//! ```
//!
//! Any number of sessions may wait concurrently. Replies are matched by
//! address only, so two outstanding commands to the same device can receive
//! each other's acknowledgement.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::dispatch::Dispatcher;
use crate::error::{PlcError, Result};
use crate::insteon::{Address, InsteonCommand};
use crate::protocol::{encode_write_memory, Frame, INSTEON_TX_BUFFER, TRANSMIT_TRIGGER};
use crate::writer::WriterHandle;

/// Default time to wait for a device acknowledgement.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Command channel to one Insteon device.
///
/// `CommandSession` is `Clone`; clones share the PLC but wait independently.
#[derive(Clone)]
pub struct CommandSession {
    address: Address,
    dispatcher: Dispatcher,
    writer: WriterHandle,
    timeout: Duration,
}

impl CommandSession {
    /// Create a session over an existing dispatcher and writer.
    pub fn new(address: Address, dispatcher: Dispatcher, writer: WriterHandle) -> Self {
        Self {
            address,
            dispatcher,
            writer,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the acknowledgement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target device.
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Acknowledgement timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `command` and wait for the device to acknowledge it.
    ///
    /// Returns the Insteon portion of the ack (address onwards). Fails with
    /// [`PlcError::Timeout`] if no ack arrives in time; nothing is retried.
    pub async fn send(&self, command: &InsteonCommand) -> Result<Bytes> {
        let staged = encode_write_memory(INSTEON_TX_BUFFER, &command.encode(&self.address)?)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _filter = self.dispatcher.register_scoped(move |frame: Frame| {
            let _ = tx.send(frame.clone());
            Some(frame)
        });

        self.writer
            .send_batch([Bytes::from(staged), Bytes::from_static(&TRANSMIT_TRIGGER)])?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(frame)) if frame.is_ack_for(&self.address) => {
                    tracing::debug!("Ack from {}: {:02x?}", self.address, frame.as_bytes());
                    return Ok(frame.insteon_payload());
                }
                Ok(Some(frame)) => {
                    tracing::trace!(
                        "Ignoring frame {:02x?} while waiting on {}",
                        frame.as_bytes(),
                        self.address
                    );
                }
                Ok(None) => return Err(PlcError::ConnectionClosed),
                Err(_) => {
                    tracing::warn!(
                        "Device {} did not ack within {:?}",
                        self.address,
                        self.timeout
                    );
                    return Err(PlcError::Timeout {
                        address: self.address,
                        timeout: self.timeout,
                    });
                }
            }
        }
    }

    /// Send a standard command with default flags.
    pub async fn send_standard(&self, cmd1: u8, cmd2: u8) -> Result<Bytes> {
        self.send(&InsteonCommand::new(cmd1, cmd2)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::ClearToSend;
    use crate::protocol::encode_packet;
    use crate::transport::MockTransport;
    use crate::writer::{spawn_writer_task, WriterConfig};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    const ADDRESS: Address = Address::new([0x11, 0x22, 0x33]);
    const ACK: [u8; 12] = [
        0x02, 0x4f, 0x04, 0x11, 0x22, 0x33, 0xaa, 0xbb, 0xcc, 0x2f, 0x11, 0x80,
    ];

    /// Dispatcher + writer over a mock; `reply` runs when the trigger is written.
    fn harness<F>(reply: F) -> (Dispatcher, WriterHandle, Arc<MockTransport>)
    where
        F: Fn(&Dispatcher) + Send + Sync + 'static,
    {
        let dispatcher = Dispatcher::new();
        let cts = Arc::new(ClearToSend::new());
        let trigger = encode_packet(&TRANSMIT_TRIGGER).unwrap();

        let mock = {
            let dispatcher = dispatcher.clone();
            let cts = cts.clone();
            Arc::new(MockTransport::with_responder(move |packet| {
                cts.set();
                if packet == trigger {
                    reply(&dispatcher);
                }
                Vec::new()
            }))
        };

        let (writer, _task) = spawn_writer_task(
            mock.clone(),
            cts,
            Arc::new(AtomicBool::new(true)),
            WriterConfig {
                poll_interval: Duration::from_millis(5),
            },
        );
        (dispatcher, writer, mock)
    }

    #[tokio::test]
    async fn test_send_returns_ack_payload() {
        let (dispatcher, writer, mock) = harness(|d| {
            d.publish(Frame::from_slice(&[0x02, 0x45, 0x06]));
            d.publish(Frame::from_slice(&ACK));
        });
        let session = CommandSession::new(ADDRESS, dispatcher.clone(), writer);

        let reply = session.send_standard(0x11, 0x80).await.unwrap();

        assert_eq!(&reply[..], &ACK[3..]);
        assert!(dispatcher.is_empty(), "filter leaked");

        let mut expected = vec![0x02, 0x40, 0x01, 0xa4, 0x00, 0x06];
        let body = [0x11, 0x22, 0x33, 0x0f, 0x11, 0x80];
        let sum = expected[2..].iter().chain(body.iter()).map(|&b| b as u16).sum::<u16>();
        expected.extend_from_slice(&sum.wrapping_neg().to_be_bytes());
        expected.extend_from_slice(&body);
        expected.extend_from_slice(&TRANSMIT_TRIGGER);
        assert_eq!(mock.written_stream(), expected);
    }

    #[tokio::test]
    async fn test_ack_for_other_address_ignored() {
        let (dispatcher, writer, _mock) = harness(|d| {
            let mut other = ACK;
            other[3..6].copy_from_slice(&[0x44, 0x55, 0x66]);
            d.publish(Frame::from_slice(&other));
        });
        let session = CommandSession::new(ADDRESS, dispatcher.clone(), writer)
            .with_timeout(Duration::from_millis(100));

        let err = session.send_standard(0x19, 0x00).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(dispatcher.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_respects_deadline() {
        let (dispatcher, writer, _mock) = harness(|_| {});
        let session = CommandSession::new(ADDRESS, dispatcher.clone(), writer)
            .with_timeout(Duration::from_millis(200));

        let start = std::time::Instant::now();
        let err = session.send_standard(0x19, 0x00).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(
            matches!(err, PlcError::Timeout { address, timeout }
                if address == ADDRESS && timeout == Duration::from_millis(200))
        );
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
        assert!(dispatcher.is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_frames_do_not_extend_deadline() {
        let (dispatcher, writer, _mock) = harness(|_| {});
        let session = CommandSession::new(ADDRESS, dispatcher.clone(), writer)
            .with_timeout(Duration::from_millis(200));

        let noise = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                loop {
                    dispatcher.publish(Frame::from_slice(&[0x02, 0x45, 0x06]));
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
        };

        let start = std::time::Instant::now();
        assert!(session.send_standard(0x19, 0x00).await.unwrap_err().is_timeout());
        assert!(start.elapsed() < Duration::from_millis(1000));
        noise.abort();
    }

    #[tokio::test]
    async fn test_invalid_command_rejected_before_queueing() {
        let (dispatcher, writer, mock) = harness(|_| {});
        let session = CommandSession::new(ADDRESS, dispatcher.clone(), writer.clone());

        let command = InsteonCommand::new(0x2e, 0x00).with_extra(vec![0u8; 15]);
        assert!(matches!(
            session.send(&command).await,
            Err(PlcError::InvalidArgument(_))
        ));
        assert!(dispatcher.is_empty());
        assert_eq!(writer.pending_count(), 0);
        assert!(mock.written().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_to_different_devices() {
        let other = Address::new([0x44, 0x55, 0x66]);
        let (dispatcher, writer, _mock) = harness(move |d| {
            // Each trigger answers both devices; sessions keep only their own.
            let mut ack = ACK;
            d.publish(Frame::from_slice(&ack));
            ack[3..6].copy_from_slice(&[0x44, 0x55, 0x66]);
            d.publish(Frame::from_slice(&ack));
        });

        let s1 = CommandSession::new(ADDRESS, dispatcher.clone(), writer.clone());
        let s2 = CommandSession::new(other, dispatcher.clone(), writer);

        let (r1, r2) = tokio::join!(s1.send_standard(0x19, 0), s2.send_standard(0x19, 0));
        assert_eq!(&r1.unwrap()[..3], ADDRESS.as_bytes());
        assert_eq!(&r2.unwrap()[..3], other.as_bytes());
        assert!(dispatcher.is_empty());
    }
}
