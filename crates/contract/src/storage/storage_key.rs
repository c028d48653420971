//! Storage key implementation for contract storage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a key in the contract storage system.
///
/// Keys are addressed by the owning contract's registry id plus the raw key
/// bytes. The persisted form is `encoded id || raw key`, where the id
/// encoding is order- and sign-preserving, so a prefix scan for one
/// contract can never observe another contract's keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct StorageKey {
    /// The registry id of the contract that owns this key.
    pub id: i32,

    /// The key data.
    pub key: Vec<u8>,
}

impl StorageKey {
    /// Creates a new storage key.
    pub fn new(id: i32, key: Vec<u8>) -> Self {
        Self { id, key }
    }

    /// Creates a storage key from a contract id and a single prefix byte.
    pub fn from_prefix(id: i32, prefix: u8) -> Self {
        Self::new(id, vec![prefix])
    }

    /// Creates a storage key from a prefix byte followed by a suffix.
    pub fn from_prefix_and_suffix(id: i32, prefix: u8, suffix: &[u8]) -> Self {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(prefix);
        key.extend_from_slice(suffix);
        Self::new(id, key)
    }

    /// Encodes a contract id into its 4-byte order-preserving form.
    ///
    /// The sign bit is flipped so that signed ids compare in the same
    /// order as their big-endian bytes.
    pub fn encode_id(id: i32) -> [u8; 4] {
        ((id as u32) ^ 0x8000_0000).to_be_bytes()
    }

    /// Returns the full backing-store key for this storage key.
    pub fn to_store_key(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.key.len());
        out.extend_from_slice(&Self::encode_id(self.id));
        out.extend_from_slice(&self.key);
        out
    }

    /// Returns the backing-store prefix covering `prefix` under a contract.
    pub fn store_prefix(id: i32, prefix: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + prefix.len());
        out.extend_from_slice(&Self::encode_id(id));
        out.extend_from_slice(prefix);
        out
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, hex::encode(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_layout() {
        let key = StorageKey::new(1, vec![0xAA, 0xBB]);
        let store_key = key.to_store_key();
        assert_eq!(store_key.len(), 6);
        assert_eq!(&store_key[4..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_id_encoding_preserves_order() {
        // Ascending signed ids produce ascending byte encodings.
        let ids = [i32::MIN, -6, -1, 0, 1, 7, i32::MAX];
        let encoded: Vec<[u8; 4]> = ids.iter().map(|id| StorageKey::encode_id(*id)).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn test_contract_isolation() {
        // A prefix scan over one contract's id never matches another id.
        let a = StorageKey::new(5, vec![]).to_store_key();
        let b = StorageKey::new(6, vec![0x00]).to_store_key();
        assert!(!b.starts_with(&a[..4]) || a[..4] == b[..4]);
        assert_ne!(&a[..4], &b[..4]);
    }

    #[test]
    fn test_display() {
        let key = StorageKey::new(-1, vec![0x08]);
        assert_eq!(key.to_string(), "-1:08");
    }
}
