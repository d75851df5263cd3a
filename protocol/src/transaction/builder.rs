//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] assembles an unsigned [`Transaction`]. It does
//! not pick defaults for gas, price or nonce: those depend on live chain state
//! and are filled in by the API layer before the builder is ever invoked.
//! Signing happens in [`super::signing`].

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::types::{Category, TxMajor};
use crate::crypto::hash::keccak256;

// ---------------------------------------------------------------------------
// TxSignature
// ---------------------------------------------------------------------------

/// The `(v, r, s)` triple as it appears on the wire.
///
/// `v` folds the recovery id together with the replay-protection chain id:
/// `27 + recid` for legacy signatures, `35 + 2 * chain_id + recid` otherwise.
/// An all-zero triple marks an unsigned transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl TxSignature {
    pub fn is_empty(&self) -> bool {
        self.r.is_zero() && self.s.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A Sable transaction.
///
/// There is no sender field: the sender is recovered from the signature (see
/// [`super::signing::recover_sender`]).
///
/// # Hashes
///
/// - [`Transaction::hash`] covers every field except `origin`, so stamping
///   the origin tag at submission never changes the hash.
/// - [`Transaction::signing_hash`] covers the nine unsigned fields, plus
///   `(chain_id, 0, 0)` when the signature is replay protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Major/minor classification.
    pub category: Category,

    /// Per-sender sequence number.
    pub nonce: u64,

    /// Price per unit of gas, in wei.
    pub gas_price: U256,

    /// Gas allowance.
    pub gas: u64,

    /// Recipient. `None` is a contract creation for `Normal` transactions and
    /// a self-contained attachment for `Extra` ones.
    pub to: Option<Address>,

    /// Value transferred, in wei. Stock operations reuse it as the quantity.
    pub value: U256,

    /// Call data or init code.
    pub data: Bytes,

    /// Auxiliary payload for governance and attachment categories.
    pub extra: Bytes,

    /// Signature triple, zero until signed.
    pub signature: TxSignature,

    /// Submitter tag stamped at admission. Not hashed, not signed.
    #[serde(default)]
    pub origin: Bytes,
}

impl Transaction {
    /// Transaction hash: `keccak256(rlp(fields without origin))`.
    pub fn hash(&self) -> B256 {
        keccak256(self.rlp_for_hash())
    }

    /// The digest a sender signs. `chain_id` is `Some` when replay protection
    /// applies.
    pub fn signing_hash(&self, chain_id: Option<u64>) -> B256 {
        keccak256(self.rlp_for_signing(chain_id))
    }

    /// Returns `true` if the signature triple is populated.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// `Normal` transaction without a recipient.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none() && self.category.major() == TxMajor::Normal
    }

    /// The chain id bound into the signature, if any.
    pub fn chain_id(&self) -> Option<u64> {
        match self.signature.v {
            27 | 28 => None,
            v if v >= 35 => Some((v - 35) / 2),
            _ => None,
        }
    }

    /// Stamps the origin tag. The only mutation allowed after signing.
    pub fn set_origin(&mut self, origin: impl Into<Bytes>) {
        self.origin = origin.into();
    }

    /// Upper bound on the gas this transaction may spend, in wei.
    pub fn cost(&self) -> U256 {
        self.gas_price
            .saturating_mul(U256::from(self.gas))
            .saturating_add(self.value)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`] instances.
///
/// # Usage
///
/// ```rust
/// use alloy_primitives::{address, U256};
/// use sable_protocol::transaction::{Category, TransactionBuilder};
///
/// let tx = TransactionBuilder::new(Category::NORMAL)
///     .to(address!("00000000000000000000000000000000000000aa"))
///     .value(U256::from(1_000))
///     .gas(21_000)
///     .nonce(7)
///     .build();
/// assert!(!tx.is_signed());
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    /// Starts a builder for `category`. Numeric fields start at zero, payloads
    /// empty, recipient absent.
    pub fn new(category: Category) -> Self {
        Self {
            tx: Transaction {
                category,
                nonce: 0,
                gas_price: U256::ZERO,
                gas: 0,
                to: None,
                value: U256::ZERO,
                data: Bytes::new(),
                extra: Bytes::new(),
                signature: TxSignature::default(),
                origin: Bytes::new(),
            },
        }
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.tx.nonce = nonce;
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.tx.gas_price = gas_price;
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.tx.gas = gas;
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.tx.to = Some(to);
        self
    }

    /// Sets or clears the recipient.
    pub fn recipient(mut self, to: Option<Address>) -> Self {
        self.tx.to = to;
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.tx.value = value;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.tx.data = data.into();
        self
    }

    pub fn extra(mut self, extra: impl Into<Bytes>) -> Self {
        self.tx.extra = extra.into();
        self
    }

    /// Consumes the builder and returns the unsigned transaction.
    pub fn build(self) -> Transaction {
        self.tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
