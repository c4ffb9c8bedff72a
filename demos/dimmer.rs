//! Drive a dimmer through a simulated PowerLinc.
//!
//! The simulated modem acks every transmitted command from device 11.22.33
//! and remembers its level.
//!
//! ```text
//! RUST_LOG=powerlinc=debug cargo run --example dimmer
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use powerlinc::protocol::{report_chunks, InboundReport, TRANSMIT_TRIGGER};
use powerlinc::transport::MockTransport;
use powerlinc::{Address, Plc, Result};
use tracing_subscriber::EnvFilter;

/// Modem double answering for a single dimmer.
fn simulated_modem(device: Address) -> MockTransport {
    let level = AtomicU8::new(0);
    let stream = Mutex::new(Vec::new());

    MockTransport::with_responder(move |packet| {
        let mut stream = stream.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(report) = InboundReport::parse(packet) {
            stream.extend_from_slice(report.payload);
        }
        if !stream.ends_with(&TRANSMIT_TRIGGER) {
            return Vec::new();
        }

        // write-memory header (8) + address (3) + flags, cmd1, cmd2
        let (cmd1, cmd2) = (stream[12], stream[13]);
        stream.clear();
        if cmd1 == 0x11 {
            level.store(cmd2, Ordering::Relaxed);
        }

        let mut ack = vec![0x02, 0x4f, 0x04];
        ack.extend_from_slice(device.as_bytes());
        ack.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0x2f, cmd1, level.load(Ordering::Relaxed)]);
        report_chunks(&ack)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("powerlinc=info")),
        )
        .init();

    let address: Address = "11.22.33".parse()?;
    let plc = Plc::builder()
        .read_timeout(Duration::from_millis(10))
        .command_timeout(Duration::from_secs(1))
        .start(Arc::new(simulated_modem(address)))?;

    let dimmer = plc.dimmer(address);
    for percent in [25, 50, 100, 0] {
        let reported = dimmer.set_level(percent).await?;
        tracing::info!("set {}% -> device reports {:?}", percent, reported);
    }

    dimmer.set_level(60).await?;
    tracing::info!(
        "{} is {} at {:?}%",
        address,
        if dimmer.status().await? { "on" } else { "off" },
        dimmer.get_percent().await?
    );

    let nobody: Address = "0a0b0c".parse()?;
    match plc.dimmer(nobody).get_level().await {
        Err(e) if e.is_timeout() => tracing::warn!("{}", e),
        other => tracing::info!("unexpected reply: {:?}", other),
    }

    plc.shutdown().await
}
