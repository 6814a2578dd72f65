//! Content hashing.
//!
//! Thin wrapper over `ring::digest` producing lowercase hex strings.

use ring::digest::{self, Algorithm, SHA1_FOR_LEGACY_USE_ONLY, SHA256};

/// Digest algorithms used for file content hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
}

impl HashAlgorithm {
    fn ring(self) -> &'static Algorithm {
        match self {
            HashAlgorithm::Sha256 => &SHA256,
            HashAlgorithm::Sha1 => &SHA1_FOR_LEGACY_USE_ONLY,
        }
    }
}

/// Hex digest of `data`.
pub fn hex_digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
    hex::encode(digest::digest(algorithm.ring(), data))
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_digest(HashAlgorithm::Sha256, data)
}

/// Hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex_digest(HashAlgorithm::Sha1, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
