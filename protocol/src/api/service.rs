//! Transaction facade.
//!
//! One method per request shape of the transaction surface:
//!
//! ```text
//! send_raw_transaction   decode → admission
//! send_transaction       [lock] → defaults → build → sign → admission
//! sign_transaction       [lock] → defaults → build → sign
//! call                   simulator, unmetered
//! estimate_gas           estimator, metered probes
//! sign / ec_recover      personal messages
//! resend                 match pooled tx → re-sign with new gas → admission
//! ```
//!
//! The address lock is taken only when the caller left the nonce out. With
//! an explicit nonce, ordering is the caller's business.

use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::args::{CallArgs, SendTxArgs};
use super::backend::Backend;
use super::call::{call, CallResult};
use super::error::ApiError;
use super::estimate::{estimate_gas, estimate_gas_with_cancel, GasEstimate};
use super::lock::AddrLocker;
use super::signer;
use super::submit::submit_transaction;
use crate::storage::BlockNumber;
use crate::transaction::signing::own_signing_hash;
use crate::transaction::{recover_sender, Transaction};
use crate::vm::VmConfig;

/// A transaction as returned to clients: the entity plus its hash and
/// recovered sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub hash: B256,
    pub from: Option<Address>,
    #[serde(flatten)]
    pub tx: Transaction,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            hash: tx.hash(),
            from: recover_sender(&tx).ok(),
            tx,
        }
    }
}

/// Output of the sign-only path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Wire encoding, ready for `send_raw_transaction`.
    pub raw: Bytes,
    pub tx: TransactionView,
}

#[derive(Clone)]
pub struct TransactionApi {
    backend: Backend,
    locker: Arc<AddrLocker>,
}

impl TransactionApi {
    pub fn new(backend: Backend) -> Self {
        Self::with_locker(backend, Arc::new(AddrLocker::new()))
    }

    /// Shares a lock table with other facades signing for the same accounts.
    pub fn with_locker(backend: Backend, locker: Arc<AddrLocker>) -> Self {
        Self { backend, locker }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn locker(&self) -> Arc<AddrLocker> {
        self.locker.clone()
    }

    /// Admits an externally signed, wire-encoded transaction.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ApiError> {
        let tx = Transaction::decode_wire(raw)?;
        submit_transaction(&self.backend, tx).await
    }

    pub async fn send_transaction(&self, args: SendTxArgs) -> Result<B256, ApiError> {
        self.send_with(args, None).await
    }

    /// Intent path with an optional passphrase for locked accounts.
    pub(crate) async fn send_with(
        &self,
        args: SendTxArgs,
        passphrase: Option<&str>,
    ) -> Result<B256, ApiError> {
        let _guard = match args.nonce {
            None => Some(self.locker.lock(args.from).await),
            Some(_) => None,
        };
        let signed = self.build_and_sign(args, passphrase).await?;
        submit_transaction(&self.backend, signed).await
    }

    /// Builds and signs without submitting.
    pub async fn sign_transaction(&self, args: SendTxArgs) -> Result<SignedTransaction, ApiError> {
        let _guard = match args.nonce {
            None => Some(self.locker.lock(args.from).await),
            Some(_) => None,
        };
        let signed = self.build_and_sign(args, None).await?;
        Ok(SignedTransaction {
            raw: signed.encode_wire(),
            tx: signed.into(),
        })
    }

    async fn build_and_sign(
        &self,
        mut args: SendTxArgs,
        passphrase: Option<&str>,
    ) -> Result<Transaction, ApiError> {
        args.set_defaults(&self.backend).await?;
        let tx = build(&args)?;
        signer::sign_transaction(&self.backend, args.from, tx, passphrase)
    }

    /// Read-only simulation; metering off, bounded by the call timeout.
    pub async fn call(&self, args: &CallArgs, block: BlockNumber) -> Result<CallResult, ApiError> {
        call(&self.backend, args, block, VmConfig::UNMETERED).await
    }

    pub async fn estimate_gas(&self, args: &CallArgs) -> Result<GasEstimate, ApiError> {
        estimate_gas(&self.backend, args).await
    }

    /// Estimate whose probes stop once `cancel` fires.
    pub async fn estimate_gas_with_cancel(
        &self,
        args: &CallArgs,
        cancel: &CancellationToken,
    ) -> Result<GasEstimate, ApiError> {
        estimate_gas_with_cancel(&self.backend, args, cancel).await
    }

    /// Personal-message signature by an unlocked local account.
    pub fn sign(&self, address: Address, data: &[u8]) -> Result<Bytes, ApiError> {
        let signature = signer::sign_message(&self.backend, address, data, None)?;
        Ok(Bytes::copy_from_slice(&signature))
    }

    pub fn ec_recover(&self, data: &[u8], signature: &[u8]) -> Result<Address, ApiError> {
        signer::recover_signer(data, signature)
    }

    /// Replaces a pooled transaction with a re-signed copy carrying new gas
    /// parameters.
    ///
    /// The pooled transaction is matched by sender and by signing hash of the
    /// intent after defaults, so `args` must describe it exactly, nonce
    /// included.
    pub async fn resend(
        &self,
        mut args: SendTxArgs,
        gas_price: Option<U256>,
        gas: Option<u64>,
    ) -> Result<B256, ApiError> {
        if args.nonce.is_none() {
            return Err(ApiError::InvalidRequest(
                "missing transaction nonce in transaction spec".into(),
            ));
        }
        args.set_defaults(&self.backend).await?;
        let wanted = build(&args)?;

        let matched = self.backend.pool.pending_from(&args.from).into_iter().find(|pooled| {
            own_signing_hash(pooled) == wanted.signing_hash(pooled.chain_id())
                && recover_sender(pooled).ok() == Some(args.from)
        });
        let Some(original) = matched else {
            return Err(ApiError::NotFound(wanted.hash()));
        };

        if gas_price.is_some() {
            args.gas_price = gas_price;
        }
        if gas.is_some() {
            args.gas = gas;
        }
        let replacement = signer::sign_transaction(&self.backend, args.from, build(&args)?, None)?;
        let hash = submit_transaction(&self.backend, replacement).await?;
        info!(old = %original.hash(), new = %hash, nonce = original.nonce, "transaction resent");
        Ok(hash)
    }

    pub async fn gas_price(&self) -> Result<U256, ApiError> {
        self.backend.suggest_price().await
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.backend.accounts.accounts()
    }

    /// Pool transactions sent by local accounts.
    pub fn pending_transactions(&self) -> Vec<TransactionView> {
        let local: HashSet<Address> = self.accounts().into_iter().collect();
        let views: Vec<TransactionView> = self
            .backend
            .pool
            .pending()
            .into_iter()
            .map(TransactionView::from)
            .filter(|view| view.from.map(|from| local.contains(&from)).unwrap_or(false))
            .collect();
        debug!(count = views.len(), "pending local transactions");
        views
    }

    pub fn block_number(&self) -> u64 {
        self.backend.chain.current_header().number
    }
}

/// `to_transaction`, refusing intents that build nothing.
fn build(args: &SendTxArgs) -> Result<Transaction, ApiError> {
    args.to_transaction()?.ok_or_else(|| {
        ApiError::InvalidRequest(format!(
            "{} transactions without a recipient are built by set_word / set_data",
            args.category
        ))
    })
}
