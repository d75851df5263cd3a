//! # Block Headers and Snapshot Selectors
//!
//! The transaction layer never looks inside block bodies. It needs three
//! things from a header: the height (replay-protection activation and the
//! genesis-only validator rule), the gas limit (ceiling heuristic for the gas
//! estimator) and the coinbase.
//!
//! ## Hash Computation
//!
//! `hash = keccak256(number || parent_hash || timestamp || coinbase ||
//! gas_limit || state_root || tx_root)`, integers big-endian.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash::keccak256;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height, genesis = 0.
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    /// Unix timestamp, seconds.
    pub timestamp: u64,
    /// Address credited for producing the block.
    pub coinbase: Address,
    pub gas_limit: u64,
    pub state_root: B256,
    pub tx_root: B256,
}

impl BlockHeader {
    /// Builds a header and seals its hash.
    pub fn new(
        number: u64,
        parent_hash: B256,
        timestamp: u64,
        coinbase: Address,
        gas_limit: u64,
        state_root: B256,
        tx_root: B256,
    ) -> Self {
        let mut header = Self {
            number,
            hash: B256::ZERO,
            parent_hash,
            timestamp,
            coinbase,
            gas_limit,
            state_root,
            tx_root,
        };
        header.hash = header.compute_hash();
        header
    }

    /// Recomputes the hash from the header fields.
    pub fn compute_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(8 + 32 + 8 + 20 + 8 + 32 + 32);
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(self.parent_hash.as_slice());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(self.coinbase.as_slice());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(self.state_root.as_slice());
        buf.extend_from_slice(self.tx_root.as_slice());
        keccak256(&buf)
    }

    /// The not-yet-sealed header that would follow this one.
    pub fn pending_child(&self, coinbase: Address, timestamp: u64) -> Self {
        Self::new(
            self.number + 1,
            self.hash,
            timestamp.max(self.timestamp),
            coinbase,
            self.gas_limit,
            self.state_root,
            B256::ZERO,
        )
    }
}

/// Root over the hashes of `transactions`: `keccak256(h1 || h2 || ...)`.
/// Zero for an empty block.
pub fn transactions_root(transactions: &[Transaction]) -> B256 {
    if transactions.is_empty() {
        return B256::ZERO;
    }
    let mut buf = Vec::with_capacity(transactions.len() * 32);
    for tx in transactions {
        buf.extend_from_slice(tx.hash().as_slice());
    }
    keccak256(&buf)
}

// ---------------------------------------------------------------------------
// BlockNumber
// ---------------------------------------------------------------------------

/// Which state a read should run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockNumber {
    /// The most recent sealed block.
    #[default]
    Latest,
    /// The block being assembled on top of latest.
    Pending,
    /// A specific height.
    Number(u64),
}

impl BlockNumber {
    pub const EARLIEST: BlockNumber = BlockNumber::Number(0);
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Pending => write!(f, "pending"),
            Self::Number(n) => write!(f, "{:#x}", n),
        }
    }
}

impl FromStr for BlockNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            "earliest" => Ok(Self::EARLIEST),
            other => {
                let parsed = match other.strip_prefix("0x") {
                    Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
                    None => other.parse::<u64>(),
                };
                parsed
                    .map(Self::Number)
                    .map_err(|_| format!("invalid block number {other:?}"))
            }
        }
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tag(String),
            Height(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Height(n) => Ok(Self::Number(n)),
            Raw::Tag(tag) => tag.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
