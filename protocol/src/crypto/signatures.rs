//! # Detached Message Signatures
//!
//! The "personal message" scheme: the message is wrapped with a fixed prefix
//! and its length before hashing, and the signature is serialized as
//! `r || s || v` with `v` offset by 27. The offset exists for compatibility
//! with wallets that have always produced it. Recovery accepts only the two
//! legacy values.

use alloy_primitives::Address;
use thiserror::Error;

use super::hash::personal_message_hash;
use super::keys::{KeyError, Keypair, RecoverableSignature, RECOVERABLE_SIGNATURE_LENGTH};

/// Offset added to the recovery id of personal signatures.
pub const LEGACY_V_OFFSET: u8 = 27;

/// Errors raised while recovering a personal signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be {RECOVERABLE_SIGNATURE_LENGTH} bytes long, got {0}")]
    InvalidLength(usize),

    #[error("invalid signature recovery id {0} (expected 27 or 28)")]
    InvalidRecoveryId(u8),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Signs `message` with the personal-message scheme, returning `r || s || v`.
pub fn sign_personal(
    keypair: &Keypair,
    message: &[u8],
) -> Result<[u8; RECOVERABLE_SIGNATURE_LENGTH], KeyError> {
    let signature = keypair.sign_hash(&personal_message_hash(message))?;
    Ok(to_legacy_bytes(&signature))
}

/// Serializes a recoverable signature with the legacy `v` offset applied.
pub fn to_legacy_bytes(signature: &RecoverableSignature) -> [u8; RECOVERABLE_SIGNATURE_LENGTH] {
    let mut bytes = signature.to_bytes();
    bytes[64] += LEGACY_V_OFFSET;
    bytes
}

/// Recovers the address that produced `signature` over `message`.
pub fn recover_personal(message: &[u8], signature: &[u8]) -> Result<Address, SignatureError> {
    let raw: &[u8; RECOVERABLE_SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| SignatureError::InvalidLength(signature.len()))?;

    let v = raw[64];
    if v != LEGACY_V_OFFSET && v != LEGACY_V_OFFSET + 1 {
        return Err(SignatureError::InvalidRecoveryId(v));
    }

    let mut parsed = RecoverableSignature::from_bytes(raw);
    parsed.recid = v - LEGACY_V_OFFSET;
    Ok(parsed.recover(&personal_message_hash(message))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover() {
        let keypair = Keypair::generate();
        let signature = sign_personal(&keypair, b"hello sable").unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_eq!(
            recover_personal(b"hello sable", &signature).unwrap(),
            keypair.address()
        );
    }

    #[test]
    fn rejects_short_signature() {
        match recover_personal(b"msg", &[0u8; 64]) {
            Err(SignatureError::InvalidLength(64)) => {}
            other => panic!("expected InvalidLength, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unnormalised_recovery_id() {
        let keypair = Keypair::generate();
        let mut signature = sign_personal(&keypair, b"msg").unwrap();
        signature[64] -= 27;
        match recover_personal(b"msg", &signature) {
            Err(SignatureError::InvalidRecoveryId(v)) => assert!(v <= 1),
            other => panic!("expected InvalidRecoveryId, got {:?}", other),
        }
    }

    #[test]
    fn different_message_recovers_different_signer() {
        let keypair = Keypair::generate();
        let signature = sign_personal(&keypair, b"original").unwrap();
        if let Ok(addr) = recover_personal(b"tampered", &signature) {
            assert_ne!(addr, keypair.address());
        }
    }
}
