//! # Encrypted Keystore
//!
//! Holds secp256k1 keys sealed with AES-256-GCM under a passphrase-derived
//! key. A sealed key is useless until [`KeyStore::unlock`] decrypts it into
//! the unlocked set, optionally with an expiry. Signing through
//! [`Wallet::sign_hash`] only ever uses unlocked keys;
//! [`Wallet::sign_hash_with_passphrase`] decrypts for a single operation and
//! leaves the unlocked set alone.
//!
//! ## Persistence
//!
//! A keystore opened with [`KeyStore::open`] writes one JSON file per key,
//! named `UTC--<timestamp>--<address>.json`, and loads every `*.json` file in
//! the directory at startup. [`KeyStore::in_memory`] keeps everything in
//! process memory, which is what tests and throwaway devnets use.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::wallet::{AccountRegistry, KeyManager, Wallet, WalletError};
use crate::crypto::encryption::{decrypt, derive_key, encrypt, random_salt};
use crate::crypto::keys::{Keypair, RecoverableSignature};

// ---------------------------------------------------------------------------
// SealedKey
// ---------------------------------------------------------------------------

/// A secret key at rest. This is also the on-disk file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub address: Address,
    /// Hex-encoded KDF salt.
    pub salt: String,
    /// Hex-encoded `nonce || ciphertext`.
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
}

impl SealedKey {
    fn seal(keypair: &Keypair, passphrase: &str) -> Result<Self, WalletError> {
        let salt = random_salt();
        let sealing_key = derive_key(passphrase, &salt);
        let ciphertext = encrypt(&sealing_key, &keypair.secret_bytes())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        Ok(Self {
            address: keypair.address(),
            salt: hex::encode(salt),
            ciphertext: hex::encode(ciphertext),
            created_at: Utc::now(),
        })
    }

    fn open(&self, passphrase: &str) -> Result<Keypair, WalletError> {
        let salt = hex::decode(&self.salt).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let ciphertext =
            hex::decode(&self.ciphertext).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let sealing_key = derive_key(passphrase, &salt);
        let secret = decrypt(&sealing_key, &ciphertext).map_err(|_| WalletError::WrongPassphrase)?;
        let keypair =
            Keypair::from_secret_bytes(&secret).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        if keypair.address() != self.address {
            return Err(WalletError::InvalidKey(format!(
                "sealed key decrypts to {} instead of {}",
                keypair.address(),
                self.address
            )));
        }
        Ok(keypair)
    }

    fn file_name(&self) -> String {
        format!(
            "UTC--{}--{}.json",
            self.created_at.format("%Y-%m-%dT%H-%M-%S%.fZ"),
            hex::encode(self.address)
        )
    }
}

struct UnlockedKey {
    keypair: Keypair,
    expires_at: Option<DateTime<Utc>>,
}

impl UnlockedKey {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

struct Inner {
    dir: Option<PathBuf>,
    sealed: DashMap<Address, SealedKey>,
    unlocked: DashMap<Address, UnlockedKey>,
    /// Accounts in creation/load order.
    order: RwLock<Vec<Address>>,
}

/// Passphrase-protected key storage. Cheap to clone.
#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("dir", &self.inner.dir)
            .field("accounts", &self.inner.order.read().len())
            .field("unlocked", &self.inner.unlocked.len())
            .finish()
    }
}

impl KeyStore {
    /// A keystore that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::with_dir(None)
    }

    /// Opens (creating if needed) a file-backed keystore and loads every key
    /// file in `dir`, ordered by file name.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, WalletError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| WalletError::Io(e.to_string()))?;

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| WalletError::Io(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let store = Self::with_dir(Some(dir.clone()));
        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|e| WalletError::Io(e.to_string()))?;
            match serde_json::from_str::<SealedKey>(&raw) {
                Ok(sealed) => {
                    if store.insert(sealed).is_err() {
                        warn!(path = %path.display(), "duplicate key file skipped");
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable key file skipped"),
            }
        }

        info!(dir = %dir.display(), accounts = store.len(), "keystore opened");
        Ok(store)
    }

    fn with_dir(dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir,
                sealed: DashMap::new(),
                unlocked: DashMap::new(),
                order: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `address` is currently unlocked and not expired.
    pub fn is_unlocked(&self, address: &Address) -> bool {
        self.inner
            .unlocked
            .get(address)
            .map(|k| !k.is_expired(Utc::now()))
            .unwrap_or(false)
    }

    fn insert(&self, sealed: SealedKey) -> Result<Address, WalletError> {
        let address = sealed.address;
        let mut order = self.inner.order.write();
        if self.inner.sealed.contains_key(&address) {
            return Err(WalletError::DuplicateAccount(address));
        }
        self.inner.sealed.insert(address, sealed);
        order.push(address);
        Ok(address)
    }

    fn store(&self, keypair: &Keypair, passphrase: &str) -> Result<Address, WalletError> {
        let sealed = SealedKey::seal(keypair, passphrase)?;
        if let Some(dir) = &self.inner.dir {
            if self.inner.sealed.contains_key(&sealed.address) {
                return Err(WalletError::DuplicateAccount(sealed.address));
            }
            let json =
                serde_json::to_string_pretty(&sealed).map_err(|e| WalletError::Io(e.to_string()))?;
            fs::write(dir.join(sealed.file_name()), json)
                .map_err(|e| WalletError::Io(e.to_string()))?;
        }
        self.insert(sealed)
    }

    fn sealed(&self, address: &Address) -> Result<SealedKey, WalletError> {
        self.inner
            .sealed
            .get(address)
            .map(|s| s.clone())
            .ok_or(WalletError::UnknownAccount(*address))
    }
}

impl AccountRegistry for KeyStore {
    fn accounts(&self) -> Vec<Address> {
        self.inner.order.read().clone()
    }

    fn find(&self, address: &Address) -> Option<Arc<dyn Wallet>> {
        if !self.inner.sealed.contains_key(address) {
            return None;
        }
        Some(Arc::new(KeyStoreWallet {
            address: *address,
            store: self.clone(),
        }))
    }
}

impl KeyManager for KeyStore {
    fn new_account(&self, passphrase: &str) -> Result<Address, WalletError> {
        let address = self.store(&Keypair::generate(), passphrase)?;
        info!(%address, "new account created");
        Ok(address)
    }

    fn import_raw_key(&self, secret_hex: &str, passphrase: &str) -> Result<Address, WalletError> {
        let keypair =
            Keypair::from_hex(secret_hex).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let address = self.store(&keypair, passphrase)?;
        info!(%address, "raw key imported");
        Ok(address)
    }

    fn unlock(
        &self,
        address: &Address,
        passphrase: &str,
        duration: Option<Duration>,
    ) -> Result<(), WalletError> {
        let keypair = self.sealed(address)?.open(passphrase)?;
        let expires_at = duration
            .filter(|d| !d.is_zero())
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        self.inner.unlocked.insert(
            *address,
            UnlockedKey {
                keypair,
                expires_at,
            },
        );
        debug!(%address, ?expires_at, "account unlocked");
        Ok(())
    }

    fn lock(&self, address: &Address) -> Result<(), WalletError> {
        if !self.inner.sealed.contains_key(address) {
            return Err(WalletError::UnknownAccount(*address));
        }
        self.inner.unlocked.remove(address);
        debug!(%address, "account locked");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeyStoreWallet
// ---------------------------------------------------------------------------

/// Single-account view handed out by [`KeyStore::find`].
struct KeyStoreWallet {
    address: Address,
    store: KeyStore,
}

impl KeyStoreWallet {
    fn check(&self, address: &Address) -> Result<(), WalletError> {
        if *address != self.address {
            return Err(WalletError::UnknownAccount(*address));
        }
        Ok(())
    }
}

impl Wallet for KeyStoreWallet {
    fn url(&self) -> String {
        match &self.store.inner.dir {
            Some(dir) => format!("keystore://{}", dir.display()),
            None => "keystore://memory".to_string(),
        }
    }

    fn contains(&self, address: &Address) -> bool {
        *address == self.address
    }

    fn sign_hash(&self, address: &Address, hash: &B256) -> Result<RecoverableSignature, WalletError> {
        self.check(address)?;
        let unlocked = &self.store.inner.unlocked;

        let expired = match unlocked.get(address) {
            None => return Err(WalletError::Locked(*address)),
            Some(key) if key.is_expired(Utc::now()) => true,
            Some(key) => {
                return key
                    .keypair
                    .sign_hash(hash)
                    .map_err(|e| WalletError::Signing(e.to_string()))
            }
        };
        if expired {
            unlocked.remove(address);
            debug!(%address, "unlock expired");
        }
        Err(WalletError::Locked(*address))
    }

    fn sign_hash_with_passphrase(
        &self,
        address: &Address,
        passphrase: &str,
        hash: &B256,
    ) -> Result<RecoverableSignature, WalletError> {
        self.check(address)?;
        let keypair = self.store.sealed(address)?.open(passphrase)?;
        keypair
            .sign_hash(hash)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn digest() -> B256 {
        B256::repeat_byte(0x42)
    }

    #[test]
    fn new_account_is_listed_and_locked() {
        let store = KeyStore::in_memory();
        let address = store.new_account("pw").unwrap();
        assert_eq!(store.accounts(), vec![address]);
        assert!(!store.is_unlocked(&address));

        let wallet = store.find(&address).unwrap();
        match wallet.sign_hash(&address, &digest()) {
            Err(WalletError::Locked(a)) => assert_eq!(a, address),
            other => panic!("expected Locked, got {:?}", other),
        }
    }

    #[test]
    fn unlock_then_sign() {
        let store = KeyStore::in_memory();
        let address = store.new_account("pw").unwrap();
        store.unlock(&address, "pw", None).unwrap();

        let sig = store.find(&address).unwrap().sign_hash(&address, &digest()).unwrap();
        assert_eq!(sig.recover(&digest()).unwrap(), address);

        store.lock(&address).unwrap();
        assert!(!store.is_unlocked(&address));
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let store = KeyStore::in_memory();
        let address = store.new_account("right").unwrap();
        match store.unlock(&address, "wrong", None) {
            Err(WalletError::WrongPassphrase) => {}
            other => panic!("expected WrongPassphrase, got {:?}", other),
        }
        let wallet = store.find(&address).unwrap();
        match wallet.sign_hash_with_passphrase(&address, "wrong", &digest()) {
            Err(WalletError::WrongPassphrase) => {}
            other => panic!("expected WrongPassphrase, got {:?}", other),
        }
    }

    #[test]
    fn passphrase_signing_does_not_unlock() {
        let store = KeyStore::in_memory();
        let address = store.new_account("pw").unwrap();
        let wallet = store.find(&address).unwrap();
        let sig = wallet.sign_hash_with_passphrase(&address, "pw", &digest()).unwrap();
        assert_eq!(sig.recover(&digest()).unwrap(), address);
        assert!(!store.is_unlocked(&address));
    }

    #[test]
    fn expired_unlock_relocks() {
        let store = KeyStore::in_memory();
        let address = store.new_account("pw").unwrap();
        store.unlock(&address, "pw", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let wallet = store.find(&address).unwrap();
        match wallet.sign_hash(&address, &digest()) {
            Err(WalletError::Locked(_)) => {}
            other => panic!("expected Locked, got {:?}", other),
        }
        assert!(!store.is_unlocked(&address));
    }

    #[test]
    fn import_known_key() {
        let store = KeyStore::in_memory();
        let address = store.import_raw_key(SECRET, "pw").unwrap();
        assert_eq!(address, Keypair::from_hex(SECRET).unwrap().address());

        match store.import_raw_key(SECRET, "other") {
            Err(WalletError::DuplicateAccount(a)) => assert_eq!(a, address),
            other => panic!("expected DuplicateAccount, got {:?}", other),
        }
        assert!(store.import_raw_key("zz", "pw").is_err());
    }

    #[test]
    fn unknown_accounts() {
        let store = KeyStore::in_memory();
        let stranger = Address::repeat_byte(0x11);
        assert!(store.find(&stranger).is_none());
        match store.unlock(&stranger, "pw", None) {
            Err(WalletError::UnknownAccount(a)) => assert_eq!(a, stranger),
            other => panic!("expected UnknownAccount, got {:?}", other),
        }
        assert!(store.lock(&stranger).is_err());
    }

    #[test]
    fn accounts_keep_creation_order() {
        let store = KeyStore::in_memory();
        let a = store.new_account("a").unwrap();
        let b = store.new_account("b").unwrap();
        let c = store.new_account("c").unwrap();
        assert_eq!(store.accounts(), vec![a, b, c]);
    }

    #[test]
    fn file_backed_store_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let address = {
            let store = KeyStore::open(dir.path()).unwrap();
            store.import_raw_key(SECRET, "pw").unwrap()
        };

        let reopened = KeyStore::open(dir.path()).unwrap();
        assert_eq!(reopened.accounts(), vec![address]);
        reopened.unlock(&address, "pw", None).unwrap();
        assert!(reopened.is_unlocked(&address));
    }
}
