//! Transport module - raw HID report I/O.
//!
//! Provides:
//! - [`Transport`] - blocking read/write of fixed-size HID reports
//! - [`MockTransport`] - in-memory modem double for tests and demos
//! - `HidTransport` - a real PowerLinc over `hidapi` (feature `hid`)
//!
//! Transports are blocking; the PLC drives them from Tokio's blocking pool.

#[cfg(feature = "hid")]
mod hid;
mod mock;

#[cfg(feature = "hid")]
pub use hid::{HidTransport, POWERLINC_PID, POWERLINC_VID};
pub use mock::{MockTransport, Responder};

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocking access to the modem's HID endpoint.
pub trait Transport: Send + Sync + 'static {
    /// Read one report of at most `max_len` bytes.
    ///
    /// Returns an empty vector when nothing arrived within `timeout`.
    fn read(&self, max_len: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Write one outbound packet.
    fn write(&self, packet: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn read(&self, max_len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        (**self).read(max_len, timeout)
    }

    fn write(&self, packet: &[u8]) -> io::Result<()> {
        (**self).write(packet)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&self, max_len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        (**self).read(max_len, timeout)
    }

    fn write(&self, packet: &[u8]) -> io::Result<()> {
        (**self).write(packet)
    }
}

/// Run `read_slice` with timeouts of at most `slice` until it returns data
/// or `timeout` has elapsed.
///
/// Lets a blocking read release a shared device between slices, so a writer
/// waits for at most one slice rather than the whole read timeout.
#[cfg_attr(not(feature = "hid"), allow(dead_code))]
pub(crate) fn read_in_slices<F>(timeout: Duration, slice: Duration, mut read_slice: F) -> io::Result<usize>
where
    F: FnMut(Duration) -> io::Result<usize>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let n = read_slice(remaining.min(slice))?;
        if n > 0 || Instant::now() >= deadline {
            return Ok(n);
        }
        std::thread::yield_now();
    }
}
