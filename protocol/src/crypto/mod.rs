//! # Cryptographic Primitives for Sable
//!
//! Everything that touches key material or digests flows through here.
//! The choices are dictated by the account model rather than taste:
//!
//! - **secp256k1 (k256)** for recoverable ECDSA signatures. Senders are never
//!   transmitted, they are recovered from the signature.
//! - **Keccak-256** for transaction hashes, signing hashes and address
//!   derivation.
//! - **SHA-256 + AES-256-GCM** for sealing private keys at rest in the keystore.
//!
//! Nothing in this module is novel cryptography. It is a thin, typed layer over
//! audited crates so the rest of the protocol never handles raw curve points.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encryption::{decrypt, encrypt};
pub use hash::{keccak256, personal_message_hash, sha256};
pub use keys::{Keypair, KeyError, RecoverableSignature};
pub use signatures::{recover_personal, sign_personal};
