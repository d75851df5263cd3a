//! Personal account management.
//!
//! Account lifecycle on top of a [`KeyManager`], plus the passphrase
//! variants of sending and message signing. Those never leave the account
//! unlocked afterwards.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use tracing::info;

use super::args::SendTxArgs;
use super::error::ApiError;
use super::service::TransactionApi;
use super::signer;
use crate::config::DEFAULT_UNLOCK_SECONDS;
use crate::vault::KeyManager;

#[derive(Clone)]
pub struct PersonalApi {
    keys: Arc<dyn KeyManager>,
    transactions: TransactionApi,
}

impl PersonalApi {
    /// `transactions` must share its account registry with `keys`.
    pub fn new(keys: Arc<dyn KeyManager>, transactions: TransactionApi) -> Self {
        Self { keys, transactions }
    }

    pub fn list_accounts(&self) -> Vec<Address> {
        self.keys.accounts()
    }

    pub fn new_account(&self, passphrase: &str) -> Result<Address, ApiError> {
        Ok(self.keys.new_account(passphrase)?)
    }

    pub fn import_raw_key(&self, secret_hex: &str, passphrase: &str) -> Result<Address, ApiError> {
        Ok(self.keys.import_raw_key(secret_hex, passphrase)?)
    }

    /// Unlocks for `seconds`, 300 when absent. Zero keeps the account
    /// unlocked until it is locked again or the process exits.
    pub fn unlock_account(
        &self,
        address: Address,
        passphrase: &str,
        seconds: Option<u64>,
    ) -> Result<bool, ApiError> {
        let seconds = seconds.unwrap_or(DEFAULT_UNLOCK_SECONDS);
        self.keys
            .unlock(&address, passphrase, Some(Duration::from_secs(seconds)))?;
        info!(%address, seconds, "account unlocked");
        Ok(true)
    }

    pub fn lock_account(&self, address: Address) -> Result<bool, ApiError> {
        self.keys.lock(&address)?;
        Ok(true)
    }

    /// Intent path signing with `passphrase` instead of an unlocked key.
    pub async fn send_transaction(
        &self,
        args: SendTxArgs,
        passphrase: &str,
    ) -> Result<B256, ApiError> {
        self.transactions.send_with(args, Some(passphrase)).await
    }

    pub fn sign(&self, data: &[u8], address: Address, passphrase: &str) -> Result<Bytes, ApiError> {
        let signature =
            signer::sign_message(self.transactions.backend(), address, data, Some(passphrase))?;
        Ok(Bytes::copy_from_slice(&signature))
    }
}
