//! # Key Management
//!
//! secp256k1 keypairs and recoverable signatures.
//!
//! An account is identified by the last 20 bytes of the Keccak-256 hash of its
//! uncompressed public key (minus the `0x04` tag). Signatures carry a one-bit
//! recovery id so the public key, and therefore the address, can be rebuilt
//! from `(hash, signature)` alone. That property is what lets transactions
//! omit the sender field entirely.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::keccak256;

/// Length of a serialized recoverable signature: `r || s || recid`.
pub const RECOVERABLE_SIGNATURE_LENGTH: usize = 65;

/// Errors raised by key handling and signature recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// A secp256k1 signing key together with its derived address.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Rebuilds a keypair from a 32-byte big-endian secret scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Rebuilds a keypair from a hex secret, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_secret_bytes(&bytes)
    }

    /// Exports the raw secret scalar. Only the keystore should ever call this.
    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        public_key_to_address(self.signing_key.verifying_key())
    }

    /// Signs a 32-byte prehash and returns a recoverable signature.
    ///
    /// The hash is signed as-is. Callers are responsible for domain separation
    /// (transaction signing hash vs. personal message hash).
    pub fn sign_hash(&self, hash: &B256) -> Result<RecoverableSignature, KeyError> {
        let (signature, recid) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| KeyError::SigningFailed(e.to_string()))?;
        let bytes = signature.to_bytes();
        Ok(RecoverableSignature {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
            recid: recid.to_byte(),
        })
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Keypair {}

/// Derives an address from a verifying key.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

// ---------------------------------------------------------------------------
// RecoverableSignature
// ---------------------------------------------------------------------------

/// An ECDSA signature with its recovery id normalised to `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: U256,
    pub s: U256,
    pub recid: u8,
}

impl RecoverableSignature {
    /// Serializes as `r || s || recid`.
    pub fn to_bytes(&self) -> [u8; RECOVERABLE_SIGNATURE_LENGTH] {
        let mut out = [0u8; RECOVERABLE_SIGNATURE_LENGTH];
        out[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        out[32..64].copy_from_slice(&self.s.to_be_bytes::<32>());
        out[64] = self.recid;
        out
    }

    /// Parses `r || s || recid`. The recovery id is taken verbatim and only
    /// checked when recovering.
    pub fn from_bytes(bytes: &[u8; RECOVERABLE_SIGNATURE_LENGTH]) -> Self {
        Self {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..64]),
            recid: bytes[64],
        }
    }

    /// Recovers the signer's address from the signed prehash.
    pub fn recover(&self, hash: &B256) -> Result<Address, KeyError> {
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        raw[32..].copy_from_slice(&self.s.to_be_bytes::<32>());

        let signature = Signature::from_slice(&raw).map_err(|_| KeyError::InvalidSignature)?;
        let recid = RecoveryId::from_byte(self.recid).ok_or(KeyError::InvalidRecoveryId(self.recid))?;
        let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recid)
            .map_err(|_| KeyError::RecoveryFailed)?;
        Ok(public_key_to_address(&key))
    }
}
