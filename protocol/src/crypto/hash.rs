//! # Hashing Utilities
//!
//! Keccak-256 is the workhorse: transaction hashes, signing hashes, contract
//! addresses and account addresses are all Keccak digests. SHA-256 only shows
//! up in keystore key derivation.

use alloy_primitives::B256;
use sha2::{Digest, Sha256};

pub use alloy_primitives::keccak256;

/// Prefix mixed into every detached message before hashing. A signature over a
/// prefixed message can never double as a transaction signature because no RLP
/// transaction starts with these bytes.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash of a detached message: `keccak256(prefix || len(msg) || msg)`.
///
/// The length is rendered in decimal ASCII.
pub fn personal_message_hash(message: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    buf.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    buf.extend_from_slice(message.len().to_string().as_bytes());
    buf.extend_from_slice(message);
    keccak256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            keccak256([]),
            b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn personal_hash_depends_on_length_prefix() {
        let direct = keccak256(b"hello");
        let prefixed = personal_message_hash(b"hello");
        assert_ne!(direct, prefixed);

        let manual = keccak256(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(prefixed, manual);
    }

    #[test]
    fn personal_hash_of_empty_message() {
        let manual = keccak256(b"\x19Ethereum Signed Message:\n0");
        assert_eq!(personal_message_hash(b""), manual);
    }
}
