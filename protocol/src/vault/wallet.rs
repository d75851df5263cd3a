//! # Wallet Collaborators
//!
//! The signer never touches key material. It asks an [`AccountRegistry`]
//! which [`Wallet`] holds an address, then asks that wallet to sign a 32-byte
//! hash. How the wallet protects the key (keystore file, hardware device,
//! remote signer) is its own business.
//!
//! [`KeyManager`] adds the account-management surface used by the personal
//! API: creating, importing, unlocking and locking keys.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use thiserror::Error;

use crate::crypto::keys::RecoverableSignature;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("unknown account {0}")]
    UnknownAccount(Address),

    #[error("authentication needed: account {0} is locked")]
    Locked(Address),

    #[error("could not decrypt key with given passphrase")]
    WrongPassphrase,

    #[error("account {0} already exists")]
    DuplicateAccount(Address),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("keystore i/o: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Something that can sign on behalf of one or more accounts.
pub trait Wallet: Send + Sync {
    /// Locator for logs and listings, e.g. `keystore://<path>`.
    fn url(&self) -> String;

    fn contains(&self, address: &Address) -> bool;

    /// Signs with a key that has already been unlocked.
    fn sign_hash(&self, address: &Address, hash: &B256) -> Result<RecoverableSignature, WalletError>;

    /// Signs after unlocking the key for this single operation.
    fn sign_hash_with_passphrase(
        &self,
        address: &Address,
        passphrase: &str,
        hash: &B256,
    ) -> Result<RecoverableSignature, WalletError>;
}

/// Lookup from address to the wallet that holds it.
pub trait AccountRegistry: Send + Sync {
    /// Local accounts in a stable order. The first one is the default
    /// identity for read-only calls.
    fn accounts(&self) -> Vec<Address>;

    fn find(&self, address: &Address) -> Option<Arc<dyn Wallet>>;
}

/// Account management on top of an [`AccountRegistry`].
pub trait KeyManager: AccountRegistry {
    fn new_account(&self, passphrase: &str) -> Result<Address, WalletError>;

    fn import_raw_key(&self, secret_hex: &str, passphrase: &str) -> Result<Address, WalletError>;

    /// Unlocks `address`. `None` or a zero duration unlocks until
    /// [`KeyManager::lock`] is called.
    fn unlock(
        &self,
        address: &Address,
        passphrase: &str,
        duration: Option<Duration>,
    ) -> Result<(), WalletError>;

    fn lock(&self, address: &Address) -> Result<(), WalletError>;
}
