//! Dimmer device commands.
//!
//! Levels travel as a raw byte (0-255); the percent helpers round to nearest.

use bytes::Bytes;

use crate::error::{PlcError, Result};
use crate::session::CommandSession;

use super::{cmd, Address, InsteonCommand};

/// Convert a percentage (0-100) to a raw level.
///
/// Rounds to nearest, ties to the even level.
///
/// ```
/// use powerlinc::insteon::percent_to_level;
///
/// assert_eq!(percent_to_level(0), 0);
/// assert_eq!(percent_to_level(50), 0x80);
/// assert_eq!(percent_to_level(100), 0xff);
/// ```
pub fn percent_to_level(percent: u8) -> u8 {
    let scaled = 255 * u32::from(percent.min(100));
    let (level, rem) = (scaled / 100, scaled % 100);
    if rem > 50 || (rem == 50 && level % 2 == 1) {
        (level + 1) as u8
    } else {
        level as u8
    }
}

/// Convert a raw level to a percentage, rounding to nearest.
pub fn level_to_percent(level: u8) -> u8 {
    ((100 * u32::from(level) + 127) / 255) as u8
}

/// A dimmable lighting device.
#[derive(Clone)]
pub struct Dimmer {
    session: CommandSession,
}

impl Dimmer {
    /// Wrap a session addressed to the dimmer.
    pub fn new(session: CommandSession) -> Self {
        Self { session }
    }

    /// The dimmer's address.
    pub fn address(&self) -> Address {
        self.session.address()
    }

    /// The underlying session.
    pub fn session(&self) -> &CommandSession {
        &self.session
    }

    /// Turn on at `percent` (0-100). Returns the level the device reported.
    pub async fn set_level(&self, percent: u8) -> Result<Option<u8>> {
        if percent > 100 {
            return Err(PlcError::InvalidArgument(format!(
                "level {percent}% is out of range 0-100"
            )));
        }
        self.set_raw_level(percent_to_level(percent)).await
    }

    /// Turn on at a raw level byte. Returns the level the device reported.
    pub async fn set_raw_level(&self, level: u8) -> Result<Option<u8>> {
        let reply = self.session.send(&InsteonCommand::new(cmd::ON, level)).await?;
        Ok(reported_level(&reply))
    }

    /// Query the current raw level.
    pub async fn get_level(&self) -> Result<Option<u8>> {
        let reply = self
            .session
            .send(&InsteonCommand::new(cmd::STATUS_REQUEST, 0x00))
            .await?;
        Ok(reported_level(&reply))
    }

    /// Query the current level as a percentage.
    pub async fn get_percent(&self) -> Result<Option<u8>> {
        Ok(self.get_level().await?.map(level_to_percent))
    }

    /// Whether the load is on at any level.
    pub async fn status(&self) -> Result<bool> {
        Ok(self.get_level().await?.is_some_and(|level| level != 0))
    }
}

/// The device reports its level in the last byte of the ack.
fn reported_level(reply: &Bytes) -> Option<u8> {
    reply.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_level() {
        assert_eq!(percent_to_level(50), 128);
        assert_eq!(percent_to_level(1), 3);
        assert_eq!(percent_to_level(99), 252);
        // Exact halves go to the even level
        assert_eq!(percent_to_level(10), 26);
        assert_eq!(percent_to_level(30), 76);
        assert_eq!(percent_to_level(70), 178);
        assert_eq!(percent_to_level(90), 230);
        assert_eq!(percent_to_level(200), 255);
    }

    #[test]
    fn test_level_to_percent() {
        assert_eq!(level_to_percent(0), 0);
        assert_eq!(level_to_percent(128), 50);
        assert_eq!(level_to_percent(255), 100);
        assert_eq!(level_to_percent(1), 0);
        assert_eq!(level_to_percent(2), 1);
    }

    #[test]
    fn test_percent_level_roundtrip() {
        for percent in 0..=100u8 {
            assert_eq!(level_to_percent(percent_to_level(percent)), percent);
        }
    }

    #[test]
    fn test_reported_level_is_last_byte() {
        let reply = Bytes::from_static(&[0x11, 0x22, 0x33, 0xaa, 0xbb, 0xcc, 0x2f, 0x11, 0x80]);
        assert_eq!(reported_level(&reply), Some(0x80));
        assert_eq!(reported_level(&Bytes::new()), None);
    }
}
