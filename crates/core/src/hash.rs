//! Hashing helpers for address derivation.

use crate::UInt160;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes RIPEMD160(SHA256(data)), the standard address hash.
pub fn hash160(data: &[u8]) -> UInt160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    UInt160::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash160_deterministic() {
        let a = hash160(b"vela");
        let b = hash160(b"vela");
        assert_eq!(a, b);
        assert_ne!(a, hash160(b"velb"));
        assert!(!a.is_zero());
    }
}
