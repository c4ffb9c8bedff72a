//! PowerLinc USB modem over `hidapi`.

use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use hidapi::{HidApi, HidDevice, HidError};

use super::{read_in_slices, Transport};

/// PowerLinc vendor ID.
pub const POWERLINC_VID: u16 = 0x10bf;

/// PowerLinc product ID.
pub const POWERLINC_PID: u16 = 0x0004;

/// Longest a single read holds the device lock.
///
/// Reads are split into slices of this length so writes are delayed by at
/// most one slice instead of the whole read timeout.
pub const READ_SLICE: Duration = Duration::from_millis(10);

fn slice_ms(slice: Duration) -> i32 {
    i32::try_from(slice.as_millis()).unwrap_or(i32::MAX)
}

/// A PowerLinc modem reached through the platform HID stack.
pub struct HidTransport {
    device: Mutex<HidDevice>,
}

impl HidTransport {
    /// Wrap an already opened device.
    pub fn new(device: HidDevice) -> Self {
        Self {
            device: Mutex::new(device),
        }
    }

    /// Open the first device matching `vid:pid`.
    pub fn open(vid: u16, pid: u16) -> io::Result<Self> {
        let api = HidApi::new().map_err(hid_to_io)?;
        let device = api.open(vid, pid).map_err(hid_to_io)?;
        tracing::debug!("Opened HID device {:04x}:{:04x}", vid, pid);
        Ok(Self::new(device))
    }

    /// Open the first attached PowerLinc.
    pub fn open_powerlinc() -> io::Result<Self> {
        Self::open(POWERLINC_VID, POWERLINC_PID)
    }
}

fn hid_to_io(e: HidError) -> io::Error {
    io::Error::other(e.to_string())
}

impl Transport for HidTransport {
    fn read(&self, max_len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        let n = read_in_slices(timeout, READ_SLICE, |slice| {
            let device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
            device
                .read_timeout(&mut buf, slice_ms(slice))
                .map_err(hid_to_io)
        })?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write(&self, packet: &[u8]) -> io::Result<()> {
        let device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let n = device.write(packet).map_err(hid_to_io)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "HID write returned 0"));
        }
        Ok(())
    }
}
