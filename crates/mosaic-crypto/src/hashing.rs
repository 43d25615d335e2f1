//! Content hashing using BLAKE3
//!
//! Uploaded media is fingerprinted with BLAKE3 so identical files can be
//! recognised without comparing bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a BLAKE3 hash output in bytes (256 bits)
pub const HASH_BYTE_SIZE: usize = 32;

/// Type alias for hash output bytes
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A BLAKE3 hash wrapper with convenience methods
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(HashOutput);

impl Blake3Hash {
    /// Convert to a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3Hash({})", self.to_hex())
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<blake3::Hash> for Blake3Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Hash the given bytes
pub fn hash(data: &[u8]) -> Blake3Hash {
    blake3::hash(data).into()
}

/// Hex-encoded fingerprint stored alongside uploaded media
pub fn content_hash(data: &[u8]) -> String {
    hash(data).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        let data = b"sunset.jpg bytes";
        assert_eq!(hash(data), hash(data));
        assert_ne!(hash(data), hash(b"other bytes"));
    }

    #[test]
    fn test_content_hash_is_hex() {
        let fingerprint = content_hash(b"test");
        assert_eq!(fingerprint.len(), HASH_BYTE_SIZE * 2);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
