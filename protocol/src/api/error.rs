//! Error taxonomy of the transaction API.
//!
//! Every failure a caller can see is an [`ApiError`]. Each variant belongs to
//! exactly one [`ErrorKind`] and maps to one stable JSON-RPC code, so clients
//! can tell "your transaction is malformed" from "you are not allowed" from
//! "the node could not execute your call" without parsing messages.

use std::time::Duration;

use alloy_primitives::{Address, B256};
use serde::Serialize;
use thiserror::Error;

use super::auth::AuthError;
use crate::network::mempool::PoolError;
use crate::network::rpc::{
    RpcError, EXECUTION_ERROR, GAS_ALLOWANCE_EXCEEDED, INTERNAL_ERROR, NOT_FOUND,
    RESOURCE_UNAVAILABLE, TRANSACTION_REJECTED, UNAUTHORIZED, VALIDATION_ERROR,
};
use crate::storage::ChainError;
use crate::transaction::TransactionError;
use crate::vault::WalletError;
use crate::vm::VmError;

/// Failures of the collaborators behind [`super::Backend`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("price oracle: {0}")]
    PriceOracle(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Coarse classification used for error codes and the RPC `data.kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Resource,
    Pool,
    Simulation,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::Resource => "resource",
            Self::Pool => "pool",
            Self::Simulation => "simulation",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("gas price suggestion failed: {0}")]
    PriceOracle(String),

    #[error("nonce query failed: {0}")]
    NonceQuery(String),

    #[error("missing recipient for {category} transaction")]
    MissingRecipient { category: String },

    #[error("invalid transaction: {0}")]
    ValidationFailed(#[from] TransactionError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("unknown account {0}")]
    UnknownAccount(Address),

    /// The key could not sign: locked account, wrong passphrase or a
    /// signer fault.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature must be 65 bytes long, got {0}")]
    InvalidSignatureLength(usize),

    #[error("invalid recovery id {0}, expected 27 or 28")]
    InvalidRecoveryId(u8),

    #[error(transparent)]
    PoolRejected(#[from] PoolError),

    #[error("state unavailable for block {0}")]
    StateUnavailable(String),

    #[error("execution failed: {0}")]
    Simulation(VmError),

    #[error("execution aborted (timeout = {0:?})")]
    ExecutionTimeout(Duration),

    #[error("gas required exceeds allowance ({cap}) or always failing transaction")]
    GasRequiredExceedsAllowance { cap: u64 },

    #[error("transaction {0} not found")]
    NotFound(B256),

    /// Keystore management failures (create, import, unlock, lock).
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("no coinbase configured and no local account to fall back on")]
    NoCoinbase,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingRecipient { .. }
            | Self::ValidationFailed(_)
            | Self::InvalidRequest(_)
            | Self::InvalidSignatureLength(_)
            | Self::InvalidRecoveryId(_) => ErrorKind::Validation,

            Self::Unauthorized(_) => ErrorKind::Authorization,

            Self::PriceOracle(_)
            | Self::NonceQuery(_)
            | Self::UnknownAccount(_)
            | Self::SigningFailed(_)
            | Self::StateUnavailable(_)
            | Self::NoCoinbase => ErrorKind::Resource,

            Self::Wallet(inner) => match inner {
                WalletError::WrongPassphrase
                | WalletError::InvalidKey(_)
                | WalletError::DuplicateAccount(_) => ErrorKind::Validation,
                _ => ErrorKind::Resource,
            },

            Self::PoolRejected(_) => ErrorKind::Pool,

            Self::Simulation(_)
            | Self::ExecutionTimeout(_)
            | Self::GasRequiredExceedsAllowance { .. } => ErrorKind::Simulation,

            Self::NotFound(_) => ErrorKind::NotFound,

            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::GasRequiredExceedsAllowance { .. } => GAS_ALLOWANCE_EXCEEDED,
            _ => match self.kind() {
                ErrorKind::Validation => VALIDATION_ERROR,
                ErrorKind::Authorization => UNAUTHORIZED,
                ErrorKind::Resource => RESOURCE_UNAVAILABLE,
                ErrorKind::Pool => TRANSACTION_REJECTED,
                ErrorKind::Simulation => EXECUTION_ERROR,
                ErrorKind::NotFound => NOT_FOUND,
                ErrorKind::Internal => INTERNAL_ERROR,
            },
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PriceOracle(msg) => Self::PriceOracle(msg),
            BackendError::Chain(ChainError::Unavailable(msg)) => Self::StateUnavailable(msg),
        }
    }
}

impl From<ApiError> for RpcError {
    fn from(err: ApiError) -> Self {
        RpcError::new(err.code(), err.to_string())
            .with_data(serde_json::json!({ "kind": err.kind() }))
    }
}
