//! # Vault Module — Accounts and Keys
//!
//! Where private keys live. The rest of the protocol only sees the
//! collaborator traits in [`wallet`]; [`keystore`] is the encrypted
//! in-memory (optionally file-backed) implementation used by the devnet node.
//!
//! ## Architecture
//!
//! ```text
//! wallet.rs   — Wallet / AccountRegistry / KeyManager traits, WalletError
//! keystore.rs — AES-GCM sealed secp256k1 keys with timed unlocking
//! ```

pub mod keystore;
pub mod wallet;

pub use keystore::{KeyStore, SealedKey};
pub use wallet::{AccountRegistry, KeyManager, Wallet, WalletError};
