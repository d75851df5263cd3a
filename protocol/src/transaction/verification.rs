//! Structural verification of transactions.
//!
//! [`verify_transaction`] is what the admission pipeline runs before anything
//! touches the pool. The checks are ordered from cheapest to most expensive
//! (field comparisons before signature recovery) so malformed input is turned
//! away without burning CPU on curve arithmetic.

use alloy_primitives::Address;
use thiserror::Error;

use super::builder::Transaction;
use super::signing::recover_sender;
use super::types::{Category, RecipientPolicy, TxMajor};
use crate::config::{MAX_DATA_SIZE, MAX_EXTRA_SIZE, TX_GAS};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while classifying, decoding or validating a transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The `(major, minor)` pair is not part of the category matrix.
    #[error("unknown transaction type: major {major}, minor {minor}")]
    UnknownCategory { major: u8, minor: u8 },

    /// The category needs a recipient and none was given.
    #[error("{category} transaction requires a recipient")]
    MissingRecipient { category: Category },

    /// The category is self-contained but a recipient was given.
    #[error("{category} transaction must not have a recipient")]
    RecipientNotAllowed { category: Category },

    /// The auxiliary payload exceeds its cap.
    #[error("extra payload too large: {size} bytes (max {max})")]
    ExtraTooLarge { size: usize, max: usize },

    /// The data payload exceeds its cap.
    #[error("data payload too large: {size} bytes (max {max})")]
    DataTooLarge { size: usize, max: usize },

    /// Attachment categories must carry something in `extra`.
    #[error("{category} transaction carries an empty extra payload")]
    EmptyExtra { category: Category },

    /// The gas allowance is below the per-transaction floor.
    #[error("intrinsic gas too low: have {have}, want at least {want}")]
    GasBelowFloor { have: u64, want: u64 },

    /// The signature triple is zero.
    #[error("transaction is unsigned")]
    Unsigned,

    /// The signature could not be turned back into a sender.
    #[error("invalid sender: {0}")]
    InvalidSignature(String),

    /// The signature is bound to a different chain.
    #[error("invalid chain id: expected {expected}, got {got}")]
    WrongChainId { expected: u64, got: u64 },

    /// The wire encoding is malformed.
    #[error("rlp decode failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Checks the recipient against the category's policy.
pub fn check_recipient(category: Category, to: Option<&Address>) -> Result<(), TransactionError> {
    match (category.recipient_policy(), to) {
        (RecipientPolicy::Required, None) => Err(TransactionError::MissingRecipient { category }),
        (RecipientPolicy::Forbidden, Some(_)) => {
            Err(TransactionError::RecipientNotAllowed { category })
        }
        _ => Ok(()),
    }
}

/// Checks payload sizes against their caps.
pub fn check_payload_bounds(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.extra.len() > MAX_EXTRA_SIZE {
        return Err(TransactionError::ExtraTooLarge {
            size: tx.extra.len(),
            max: MAX_EXTRA_SIZE,
        });
    }
    if tx.data.len() > MAX_DATA_SIZE {
        return Err(TransactionError::DataTooLarge {
            size: tx.data.len(),
            max: MAX_DATA_SIZE,
        });
    }
    if tx.category.major() == TxMajor::Extra && tx.extra.is_empty() {
        return Err(TransactionError::EmptyExtra {
            category: tx.category,
        });
    }
    Ok(())
}

/// Runs every structural check and returns the recovered sender.
///
/// Order:
///
/// 1. Recipient policy of the category.
/// 2. Payload bounds (`extra`, `data`, non-empty attachments).
/// 3. Gas floor.
/// 4. Signature present and recoverable.
pub fn verify_transaction(tx: &Transaction) -> Result<Address, TransactionError> {
    check_recipient(tx.category, tx.to.as_ref())?;
    check_payload_bounds(tx)?;

    if tx.gas < TX_GAS {
        return Err(TransactionError::GasBelowFloor {
            have: tx.gas,
            want: TX_GAS,
        });
    }

    recover_sender(tx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
