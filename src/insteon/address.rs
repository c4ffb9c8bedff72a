//! Insteon device addresses.

use std::fmt;
use std::str::FromStr;

use crate::error::PlcError;

/// A 3-byte Insteon device address.
///
/// Parsed and validated once, at the API boundary.
///
/// # Example
///
/// ```
/// use powerlinc::insteon::Address;
///
/// let a: Address = "11.22.33".parse().unwrap();
/// let b: Address = "112233".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "11.22.33");
/// assert!("11.22".parse::<Address>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 3]);

impl Address {
    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl From<[u8; 3]> for Address {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = PlcError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 3]>::try_from(bytes)
            .map(Self)
            .map_err(|_| PlcError::InvalidAddress(format!("{bytes:02x?}")))
    }
}

impl FromStr for Address {
    type Err = PlcError;

    /// Accepts six hex digits, optionally split into octets by `.`, `:` or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlcError::InvalidAddress(s.to_string());

        let digits: String = if s.len() == 8 {
            let sep = s.as_bytes()[2];
            if !matches!(sep, b'.' | b':' | b'-') || s.as_bytes()[5] != sep {
                return Err(invalid());
            }
            s.split(sep as char).collect()
        } else {
            s.to_string()
        };

        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 3];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}.{:02X}.{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_hex() {
        let addr: Address = "aaBB0c".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0xaa, 0xbb, 0x0c]);
    }

    #[test]
    fn test_parse_separated() {
        for s in ["11.22.33", "11:22:33", "11-22-33"] {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr, Address::new([0x11, 0x22, 0x33]), "{s}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for s in ["", "1122", "11223344", "11.22:33", "zz2233", "11 22 33", "+1.22.33", "1.122.33"] {
            let err = s.parse::<Address>().unwrap_err();
            assert!(matches!(err, PlcError::InvalidAddress(_)), "{s}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new([0x0a, 0xbc, 0x01]).to_string(), "0A.BC.01");
    }

    #[test]
    fn test_try_from_slice() {
        assert!(Address::try_from(&[1u8, 2, 3][..]).is_ok());
        assert!(Address::try_from(&[1u8, 2][..]).is_err());
    }
}
