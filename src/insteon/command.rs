//! Outbound Insteon command payloads.
//!
//! ```text
//! ┌──────────┬───────┬──────┬──────┬───────────────┐
//! │ address  │ flags │ cmd1 │ cmd2 │ extra (0..14) │
//! │ 3 bytes  │ 1     │ 1    │ 1    │               │
//! └──────────┴───────┴──────┴──────┴───────────────┘
//! ```

use crate::error::{PlcError, Result};

use super::Address;

/// Default message flags: direct, standard length, 3 hops left, 3 max hops.
pub const DEFAULT_FLAGS: u8 = 0x0F;

/// Maximum user-data bytes after cmd2 (extended message).
pub const MAX_EXTRA_LEN: usize = 14;

/// Well-known cmd1 codes.
pub mod cmd {
    /// Turn on to the level given in cmd2.
    pub const ON: u8 = 0x11;
    /// Query the current level.
    pub const STATUS_REQUEST: u8 = 0x19;
}

/// A command ready to be staged in the modem's transmit buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsteonCommand {
    /// Message flags byte.
    pub flags: u8,
    /// Primary command code.
    pub cmd1: u8,
    /// Secondary command code / argument.
    pub cmd2: u8,
    /// Extended user data (empty for standard messages).
    pub extra: Vec<u8>,
}

impl InsteonCommand {
    /// Standard-length command with default flags.
    pub fn new(cmd1: u8, cmd2: u8) -> Self {
        Self {
            flags: DEFAULT_FLAGS,
            cmd1,
            cmd2,
            extra: Vec::new(),
        }
    }

    /// Override the flags byte.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Attach extended user data.
    pub fn with_extra(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Serialize for `address`, rejecting oversized user data.
    ///
    /// # Example
    ///
    /// ```
    /// use powerlinc::insteon::{Address, InsteonCommand};
    ///
    /// let bytes = InsteonCommand::new(0x11, 0x80)
    ///     .encode(&Address::new([0x11, 0x22, 0x33]))
    ///     .unwrap();
    /// assert_eq!(bytes, vec![0x11, 0x22, 0x33, 0x0f, 0x11, 0x80]);
    /// ```
    pub fn encode(&self, address: &Address) -> Result<Vec<u8>> {
        if self.extra.len() > MAX_EXTRA_LEN {
            return Err(PlcError::InvalidArgument(format!(
                "extended data of {} bytes exceeds {}",
                self.extra.len(),
                MAX_EXTRA_LEN
            )));
        }
        let mut buf = Vec::with_capacity(6 + self.extra.len());
        buf.extend_from_slice(address.as_bytes());
        buf.extend_from_slice(&[self.flags, self.cmd1, self.cmd2]);
        buf.extend_from_slice(&self.extra);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_with_extra_and_flags() {
        let bytes = InsteonCommand::new(0x2e, 0x00)
            .with_flags(0x1f)
            .with_extra(vec![0x01; 14])
            .encode(&Address::new([0xaa, 0xbb, 0xcc]))
            .unwrap();

        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..6], &[0xaa, 0xbb, 0xcc, 0x1f, 0x2e, 0x00]);
    }

    #[test]
    fn test_encode_rejects_oversized_extra() {
        let err = InsteonCommand::new(0x2e, 0x00)
            .with_extra(vec![0u8; 15])
            .encode(&Address::new([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, PlcError::InvalidArgument(_)));
    }
}
