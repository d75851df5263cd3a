//! Transaction Builder: request records and their defaults.
//!
//! A [`SendTxArgs`] is the intent a client submits. [`SendTxArgs::set_defaults`]
//! fills what the client left out from live collaborators, and
//! [`SendTxArgs::to_transaction`] applies the recipient policy of the
//! category and materializes the unsigned [`Transaction`].
//!
//! [`CallArgs`] is the read-only counterpart used by the simulator and the
//! estimator. It is never signed.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::Backend;
use super::error::ApiError;
use crate::transaction::{
    Category, RecipientPolicy, Transaction, TransactionBuilder, TransactionError,
};

/// Numeric fields accept JSON numbers, `0x` hex strings or decimal strings.
pub(crate) mod quantity {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    pub fn parse(s: &str) -> Result<u64, String> {
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|e| format!("{s}: {e}")),
            None => s.parse::<u64>().map_err(|e| format!("{s}: {e}")),
        }
    }

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) => parse(&s).map_err(D::Error::custom),
        }
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(n) => s.serialize_str(&format!("{n:#x}")),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            match Option::<Raw>::deserialize(d)? {
                None => Ok(None),
                Some(Raw::Num(n)) => Ok(Some(n)),
                Some(Raw::Str(s)) => parse(&s).map(Some).map_err(D::Error::custom),
            }
        }
    }
}

/// A standalone numeric RPC parameter with the same leniency as the
/// quantity fields of the request records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(#[serde(with = "quantity")] pub u64);

// ---------------------------------------------------------------------------
// SendTxArgs
// ---------------------------------------------------------------------------

/// A send-transaction intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendTxArgs {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(alias = "input")]
    pub data: Bytes,
    pub extra: Bytes,
    pub category: Category,
}

impl SendTxArgs {
    pub fn new(from: Address, category: Category) -> Self {
        Self {
            from,
            category,
            ..Default::default()
        }
    }

    /// Fills gas, gas price, value and nonce where absent.
    ///
    /// Gas comes from configuration, the price from the oracle, the nonce
    /// from the pending pool. Call this while holding the sender's address
    /// lock when the nonce is absent.
    pub async fn set_defaults(&mut self, backend: &Backend) -> Result<(), ApiError> {
        if self.gas.is_none() {
            self.gas = Some(backend.config.default_gas);
        }
        if self.gas_price.is_none() {
            self.gas_price = Some(backend.suggest_price().await?);
        }
        if self.value.is_none() {
            self.value = Some(U256::ZERO);
        }
        if self.nonce.is_none() {
            let nonce = backend
                .pool
                .next_nonce(&self.from)
                .await
                .map_err(|e| ApiError::NonceQuery(e.to_string()))?;
            self.nonce = Some(nonce);
        }
        debug!(
            from = %self.from,
            gas = ?self.gas,
            nonce = ?self.nonce,
            category = %self.category,
            "intent defaults applied"
        );
        Ok(())
    }

    /// Builds the unsigned transaction.
    ///
    /// Returns `Ok(None)` for an `Extra` intent without a recipient: those
    /// attachments are built by the dedicated word/data route, not here.
    pub fn to_transaction(&self) -> Result<Option<Transaction>, ApiError> {
        let policy = self.category.recipient_policy();
        match (policy, self.to) {
            (RecipientPolicy::Forbidden, None) => return Ok(None),
            (RecipientPolicy::Forbidden, Some(_)) => {
                return Err(TransactionError::RecipientNotAllowed {
                    category: self.category,
                }
                .into())
            }
            (RecipientPolicy::Required, None) => {
                return Err(ApiError::MissingRecipient {
                    category: self.category.label(),
                })
            }
            _ => {}
        }

        let tx = TransactionBuilder::new(self.category)
            .recipient(self.to)
            .nonce(self.nonce.unwrap_or_default())
            .gas(self.gas.unwrap_or_default())
            .gas_price(self.gas_price.unwrap_or_default())
            .value(self.value.unwrap_or_default())
            .data(self.data.clone())
            .extra(self.extra.clone())
            .build();
        Ok(Some(tx))
    }
}

// ---------------------------------------------------------------------------
// CallArgs
// ---------------------------------------------------------------------------

/// A message to simulate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallArgs {
    /// Zero selects the first local account.
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(alias = "input")]
    pub data: Bytes,
    pub extra: Bytes,
    pub category: Category,
}

impl CallArgs {
    pub fn to(to: Address) -> Self {
        Self {
            to: Some(to),
            ..Default::default()
        }
    }
}

impl From<&SendTxArgs> for CallArgs {
    fn from(args: &SendTxArgs) -> Self {
        Self {
            from: args.from,
            to: args.to,
            gas: args.gas,
            gas_price: args.gas_price,
            value: args.value,
            data: args.data.clone(),
            extra: args.extra.clone(),
            category: args.category,
        }
    }
}
