//! # AES-256-GCM Sealing
//!
//! Used by the keystore to keep secret keys encrypted at rest. The sealing key
//! is derived from the account passphrase and a per-key random salt.
//!
//! ## Wire format
//!
//! `encrypt()` returns `nonce || ciphertext` (the GCM tag is appended to the
//! ciphertext by the cipher). `decrypt()` expects the same layout.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use super::hash::sha256;
use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Number of SHA-256 rounds applied when stretching a passphrase.
pub const KDF_ROUNDS: u32 = 4_096;

/// Errors that can occur during sealing and unsealing.
///
/// Decryption failures are deliberately not broken down: "wrong passphrase"
/// and "corrupted file" look the same from the outside.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

/// Encrypts `plaintext` under `key` with a random nonce.
pub fn encrypt(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts data produced by [`encrypt`].
pub fn decrypt(key: &[u8; AES_KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

/// Stretches a passphrase into a sealing key by iterated salted SHA-256.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; AES_KEY_LENGTH] {
    let mut seed = Vec::with_capacity(salt.len() + passphrase.len());
    seed.extend_from_slice(salt);
    seed.extend_from_slice(passphrase.as_bytes());

    let mut key = sha256(&seed);
    for _ in 1..KDF_ROUNDS {
        let mut round = Vec::with_capacity(key.len() + salt.len());
        round.extend_from_slice(&key);
        round.extend_from_slice(salt);
        key = sha256(&round);
    }
    key
}

/// Fresh random salt for [`derive_key`].
pub fn random_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open() {
        let key = derive_key("correct horse", b"salt");
        let sealed = encrypt(&key, b"secret scalar").unwrap();
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"secret scalar");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let sealed = encrypt(&derive_key("right", b"salt"), b"secret").unwrap();
        assert_eq!(
            decrypt(&derive_key("wrong", b"salt"), &sealed),
            Err(EncryptionError::DecryptFailed)
        );
    }

    #[test]
    fn salt_changes_key() {
        assert_ne!(derive_key("pw", b"a"), derive_key("pw", b"b"));
        assert_eq!(derive_key("pw", b"a"), derive_key("pw", b"a"));
    }

    #[test]
    fn truncated_ciphertext() {
        let key = derive_key("pw", b"salt");
        assert_eq!(decrypt(&key, &[0u8; 4]), Err(EncryptionError::CiphertextTooShort));
    }

    #[test]
    fn nonces_are_fresh() {
        let key = derive_key("pw", b"salt");
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a, b);
    }
}
