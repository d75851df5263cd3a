//! Chain access for the transaction layer, plus the in-memory devnet chain.
//!
//! [`ChainReader`] is the narrow interface the API layer uses for headers,
//! state snapshots and transaction lookups. [`DevChain`] implements it over a
//! vector of headers and one snapshot per height. Sealing a block applies the
//! given transactions to a copy of the tip state; rejected transactions are
//! reported back so the caller can drop them from its pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::block::{transactions_root, BlockHeader, BlockNumber};
use super::state::{Account, GovernanceState, StateError, StateReader, StateSnapshot, StockHolding};
use crate::config::{ChainConfig, GENESIS_GAS_LIMIT};
use crate::transaction::{recover_sender, Transaction};

// ---------------------------------------------------------------------------
// ChainReader
// ---------------------------------------------------------------------------

/// Errors from the chain collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain backend unavailable: {0}")]
    Unavailable(String),
}

/// Read access to headers, snapshots and included transactions.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_config(&self) -> ChainConfig;

    /// Latest sealed header.
    fn current_header(&self) -> BlockHeader;

    /// Header for a selector, `None` if the height is unknown.
    async fn header_by_number(&self, number: BlockNumber) -> Result<Option<BlockHeader>, ChainError>;

    /// State snapshot and its header for a selector, `None` if the height is
    /// unknown.
    async fn state_at(
        &self,
        number: BlockNumber,
    ) -> Result<Option<(Arc<dyn StateReader>, BlockHeader)>, ChainError>;

    /// An included transaction and the height that included it.
    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<(Transaction, u64)>, ChainError>;
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Pre-funded account in the genesis allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisAccount {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
}

/// Genesis description, loadable from the node's TOML config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    pub config: ChainConfig,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub alloc: BTreeMap<Address, GenesisAccount>,
    pub stock_manager: Address,
    pub holdings: BTreeMap<Address, u64>,
    pub validators: Vec<Address>,
}

impl Default for Genesis {
    fn default() -> Self {
        Self {
            config: ChainConfig::devnet(),
            gas_limit: GENESIS_GAS_LIMIT,
            timestamp: 0,
            coinbase: Address::ZERO,
            alloc: BTreeMap::new(),
            stock_manager: Address::ZERO,
            holdings: BTreeMap::new(),
            validators: Vec::new(),
        }
    }
}

impl Genesis {
    /// The genesis state snapshot.
    pub fn state(&self) -> StateSnapshot {
        let accounts = self
            .alloc
            .iter()
            .map(|(address, account)| {
                (
                    *address,
                    Account {
                        nonce: account.nonce,
                        balance: account.balance,
                        code: account.code.clone(),
                    },
                )
            })
            .collect();
        let governance = GovernanceState {
            stock_manager: self.stock_manager,
            holdings: self
                .holdings
                .iter()
                .map(|(address, number)| (*address, StockHolding::running(*number)))
                .collect(),
            validators: self.validators.clone(),
            ..Default::default()
        };
        StateSnapshot::new(accounts, governance)
    }
}

// ---------------------------------------------------------------------------
// DevChain
// ---------------------------------------------------------------------------

/// Outcome of sealing a block.
#[derive(Debug, Clone)]
pub struct SealedBlock {
    pub header: BlockHeader,
    pub included: Vec<B256>,
    pub rejected: Vec<(B256, String)>,
}

struct ChainInner {
    headers: Vec<BlockHeader>,
    states: Vec<Arc<StateSnapshot>>,
    tx_index: HashMap<B256, (Transaction, u64)>,
}

/// In-memory chain used by the devnet node and the test suites.
pub struct DevChain {
    config: ChainConfig,
    inner: RwLock<ChainInner>,
}

impl DevChain {
    pub fn new(genesis: &Genesis) -> Self {
        let state = genesis.state();
        let header = BlockHeader::new(
            0,
            B256::ZERO,
            genesis.timestamp,
            genesis.coinbase,
            genesis.gas_limit,
            state.root_hash(),
            B256::ZERO,
        );
        Self {
            config: genesis.config.clone(),
            inner: RwLock::new(ChainInner {
                headers: vec![header],
                states: vec![Arc::new(state)],
                tx_index: HashMap::new(),
            }),
        }
    }

    pub fn height(&self) -> u64 {
        self.inner.read().headers.len() as u64 - 1
    }

    /// Tip state snapshot.
    pub fn latest_state(&self) -> Arc<StateSnapshot> {
        let inner = self.inner.read();
        // Genesis is always present.
        Arc::clone(&inner.states[inner.states.len() - 1])
    }

    /// Applies `transactions` on top of the tip and appends the new block.
    pub fn seal_block(
        &self,
        transactions: Vec<Transaction>,
        coinbase: Address,
        timestamp: u64,
    ) -> SealedBlock {
        let mut inner = self.inner.write();
        let parent = inner.headers[inner.headers.len() - 1].clone();
        let mut state = (*inner.states[inner.states.len() - 1]).clone();

        let mut applied = Vec::with_capacity(transactions.len());
        let mut rejected = Vec::new();
        for tx in transactions {
            let hash = tx.hash();
            let result = recover_sender(&tx)
                .map_err(|e| e.to_string())
                .and_then(|sender| {
                    state
                        .apply_transaction(sender, &tx)
                        .map_err(|e: StateError| e.to_string())
                });
            match result {
                Ok(()) => applied.push(tx),
                Err(reason) => {
                    debug!(tx = %hash, %reason, "transaction rejected during sealing");
                    rejected.push((hash, reason));
                }
            }
        }

        let header = BlockHeader::new(
            parent.number + 1,
            parent.hash,
            timestamp.max(parent.timestamp),
            coinbase,
            parent.gas_limit,
            state.root_hash(),
            transactions_root(&applied),
        );

        let included: Vec<B256> = applied.iter().map(Transaction::hash).collect();
        for tx in applied {
            inner.tx_index.insert(tx.hash(), (tx, header.number));
        }
        inner.headers.push(header.clone());
        inner.states.push(Arc::new(state));

        info!(
            number = header.number,
            hash = %header.hash,
            txs = included.len(),
            "sealed block"
        );

        SealedBlock {
            header,
            included,
            rejected,
        }
    }

    fn resolve(&self, inner: &ChainInner, number: BlockNumber) -> Option<usize> {
        let tip = inner.headers.len() - 1;
        match number {
            BlockNumber::Latest | BlockNumber::Pending => Some(tip),
            BlockNumber::Number(n) => usize::try_from(n).ok().filter(|n| *n <= tip),
        }
    }
}

#[async_trait]
impl ChainReader for DevChain {
    fn chain_config(&self) -> ChainConfig {
        self.config.clone()
    }

    fn current_header(&self) -> BlockHeader {
        let inner = self.inner.read();
        inner.headers[inner.headers.len() - 1].clone()
    }

    async fn header_by_number(&self, number: BlockNumber) -> Result<Option<BlockHeader>, ChainError> {
        let inner = self.inner.read();
        let header = self.resolve(&inner, number).map(|i| inner.headers[i].clone());
        // The pending block is assembled on top of the tip and inherits its
        // gas limit. Devnet has no separate pending coinbase.
        Ok(match (number, header) {
            (BlockNumber::Pending, Some(tip)) => Some(tip.pending_child(tip.coinbase, tip.timestamp)),
            (_, header) => header,
        })
    }

    async fn state_at(
        &self,
        number: BlockNumber,
    ) -> Result<Option<(Arc<dyn StateReader>, BlockHeader)>, ChainError> {
        let header = match self.header_by_number(number).await? {
            Some(header) => header,
            None => return Ok(None),
        };
        let inner = self.inner.read();
        // Pending state equals the tip state until the devnet pre-executes
        // pool contents.
        let index = match self.resolve(&inner, number) {
            Some(index) => index,
            None => return Ok(None),
        };
        let state: Arc<dyn StateReader> = inner.states[index].clone();
        Ok(Some((state, header)))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<(Transaction, u64)>, ChainError> {
        Ok(self.inner.read().tx_index.get(&hash).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
