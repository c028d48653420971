//! Fixed-width 160-bit identifier used for contract and account addresses.

use crate::{Error, Result, ADDRESS_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 160-bit identifier addressing a contract or an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct UInt160([u8; ADDRESS_SIZE]);

impl UInt160 {
    /// The all-zero identifier.
    pub fn zero() -> Self {
        Self([0u8; ADDRESS_SIZE])
    }

    /// Creates an identifier from a byte slice.
    ///
    /// Fails if the slice is not exactly [`ADDRESS_SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(Error::InvalidFormat(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }
        let mut data = [0u8; ADDRESS_SIZE];
        data.copy_from_slice(bytes);
        Ok(Self(data))
    }

    /// Parses an identifier from a hex string, with or without a `0x` prefix.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(s).map_err(|e| Error::InvalidFormat(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Returns true if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; ADDRESS_SIZE]> for UInt160 {
    fn from(data: [u8; ADDRESS_SIZE]) -> Self {
        Self(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let bytes = [7u8; ADDRESS_SIZE];
        let value = UInt160::from_bytes(&bytes).unwrap();
        assert_eq!(value.as_bytes(), &bytes);

        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
        assert!(UInt160::from_bytes(&[0u8; 21]).is_err());
    }

    #[test]
    fn test_parse_round_trip() {
        let value = UInt160::from([0xAB; ADDRESS_SIZE]);
        let parsed = UInt160::parse(&value.to_string()).unwrap();
        assert_eq!(value, parsed);
    }

    #[test]
    fn test_zero() {
        assert!(UInt160::zero().is_zero());
        assert!(!UInt160::from([1; ADDRESS_SIZE]).is_zero());
    }
}
