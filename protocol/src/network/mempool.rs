//! Pending transaction pool.
//!
//! [`PendingPool`] is the collaborator interface the admission pipeline and
//! the transaction builder talk to: insert a signed transaction, ask for the
//! next free nonce of a sender, list and look up pending transactions.
//!
//! [`TxPool`] is the devnet implementation. Transactions are indexed by hash
//! for O(1) lookups, by `(sender, nonce)` for replacement and nonce
//! computation, and by gas price in a B-tree for block selection.
//!
//! ## Design
//!
//! - `DashMap` holds the entries and the per-sender nonce queues, so RPC reads
//!   never contend with each other.
//! - `parking_lot::RwLock<BTreeMap>` protects the price index. Its write lock
//!   also serializes admissions, so two racing submissions for the same
//!   `(sender, nonce)` slot cannot both win.
//! - When the pool is full, the cheapest transaction is evicted if the
//!   incoming one pays strictly more per unit of gas.
//! - A transaction with the same sender and nonce as a pooled one replaces it
//!   only if its price is at least `price_bump_percent` higher.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{POOL_MAX_PER_SENDER, POOL_MAX_SIZE, POOL_PRICE_BUMP_PERCENT};
use crate::storage::{DevChain, StateReader};
use crate::transaction::{recover_sender, Transaction};

// ---------------------------------------------------------------------------
// Collaborator interface
// ---------------------------------------------------------------------------

/// Rejections from the pending pool. Surfaced to callers verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("already known: {0}")]
    AlreadyKnown(B256),

    #[error("transaction underpriced: minimum {min}, got {got}")]
    Underpriced { min: U256, got: U256 },

    #[error("replacement transaction underpriced: need at least {required}, got {got}")]
    ReplacementUnderpriced { required: U256, got: U256 },

    #[error("nonce too low: have {have}, next expected {want}")]
    NonceTooLow { have: u64, want: u64 },

    #[error("insufficient funds for gas * price + value: balance {balance}, cost {cost}")]
    InsufficientFunds { balance: U256, cost: U256 },

    #[error("sender {sender} exceeded per-sender limit of {limit}")]
    SenderLimitExceeded { sender: Address, limit: usize },

    #[error("transaction pool is full ({size} transactions)")]
    PoolFull { size: usize },

    #[error("invalid sender: {0}")]
    InvalidSender(String),

    #[error("pool state unavailable: {0}")]
    StateUnavailable(String),
}

/// The pending pool as seen by the transaction layer.
#[async_trait]
pub trait PendingPool: Send + Sync {
    /// Admits a signed transaction.
    async fn add(&self, tx: Transaction) -> Result<(), PoolError>;

    /// Next nonce for `address`: the state nonce advanced past every
    /// contiguous pending nonce.
    async fn next_nonce(&self, address: &Address) -> Result<u64, PoolError>;

    /// Every pending transaction, highest price first.
    fn pending(&self) -> Vec<Transaction>;

    /// Pending transactions sent by `address`, in nonce order.
    fn pending_from(&self, address: &Address) -> Vec<Transaction>;

    fn get(&self, hash: &B256) -> Option<Transaction>;

    fn remove(&self, hash: &B256) -> Option<Transaction>;
}

/// Account view the pool checks admissions against.
pub trait PoolStateView: Send + Sync {
    fn state_nonce(&self, address: &Address) -> u64;
    fn state_balance(&self, address: &Address) -> U256;
}

impl PoolStateView for DevChain {
    fn state_nonce(&self, address: &Address) -> u64 {
        self.latest_state().nonce(address)
    }

    fn state_balance(&self, address: &Address) -> U256 {
        self.latest_state().balance(address)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for the devnet pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of transactions the pool holds.
    pub max_size: usize,

    /// Maximum pending transactions per sender.
    pub max_per_sender: usize,

    /// Minimum gas price accepted, in wei.
    pub min_gas_price: U256,

    /// Price increase, in percent, a same-nonce replacement must offer.
    pub price_bump_percent: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: POOL_MAX_SIZE,
            max_per_sender: POOL_MAX_PER_SENDER,
            min_gas_price: U256::ZERO,
            price_bump_percent: POOL_PRICE_BUMP_PERCENT,
        }
    }
}

// ---------------------------------------------------------------------------
// PriceKey — B-tree ordering key
// ---------------------------------------------------------------------------

/// Highest price first, then earliest admission, then hash for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PriceKey {
    price: Reverse<U256>,
    seq: u64,
    hash: B256,
}

/// A transaction with its pool bookkeeping.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub transaction: Transaction,
    pub sender: Address,
    seq: u64,
}

impl PoolEntry {
    fn key(&self) -> PriceKey {
        PriceKey {
            price: Reverse(self.transaction.gas_price),
            seq: self.seq,
            hash: self.transaction.hash(),
        }
    }
}

// ---------------------------------------------------------------------------
// TxPool
// ---------------------------------------------------------------------------

/// Thread-safe devnet pending pool.
pub struct TxPool {
    entries: DashMap<B256, PoolEntry>,
    by_sender: DashMap<Address, BTreeMap<u64, B256>>,
    price_index: RwLock<BTreeMap<PriceKey, B256>>,
    seq: AtomicU64,
    state: Arc<dyn PoolStateView>,
    config: PoolConfig,
}

impl fmt::Debug for TxPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxPool")
            .field("size", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

impl TxPool {
    pub fn new(state: Arc<dyn PoolStateView>, config: PoolConfig) -> Self {
        Self {
            entries: DashMap::new(),
            by_sender: DashMap::new(),
            price_index: RwLock::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
            state,
            config,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Synchronous admission. [`PendingPool::add`] delegates here.
    pub fn insert(&self, tx: Transaction) -> Result<B256, PoolError> {
        let hash = tx.hash();
        // Held for the whole admission.
        let mut index = self.price_index.write();

        if self.entries.contains_key(&hash) {
            return Err(PoolError::AlreadyKnown(hash));
        }

        let sender = recover_sender(&tx).map_err(|e| PoolError::InvalidSender(e.to_string()))?;

        if tx.gas_price < self.config.min_gas_price {
            return Err(PoolError::Underpriced {
                min: self.config.min_gas_price,
                got: tx.gas_price,
            });
        }

        let state_nonce = self.state.state_nonce(&sender);
        if tx.nonce < state_nonce {
            return Err(PoolError::NonceTooLow {
                have: tx.nonce,
                want: state_nonce,
            });
        }

        let balance = self.state.state_balance(&sender);
        let cost = tx.cost();
        if balance < cost {
            return Err(PoolError::InsufficientFunds { balance, cost });
        }

        let replaced = self.slot(&sender, tx.nonce);
        match replaced.as_ref().and_then(|h| self.entries.get(h).map(|e| e.clone())) {
            Some(old) => {
                let required = bumped(old.transaction.gas_price, self.config.price_bump_percent);
                if tx.gas_price < required {
                    return Err(PoolError::ReplacementUnderpriced {
                        required,
                        got: tx.gas_price,
                    });
                }
                index.remove(&old.key());
                self.entries.remove(&old.transaction.hash());
                debug!(old = %old.transaction.hash(), new = %hash, "replacing pooled transaction");
            }
            None => {
                let count = self.by_sender.get(&sender).map(|q| q.len()).unwrap_or(0);
                if count >= self.config.max_per_sender {
                    return Err(PoolError::SenderLimitExceeded {
                        sender,
                        limit: self.config.max_per_sender,
                    });
                }
                if self.entries.len() >= self.config.max_size
                    && !self.evict_cheapest(&mut index, tx.gas_price)
                {
                    return Err(PoolError::PoolFull {
                        size: self.config.max_size,
                    });
                }
            }
        }

        let entry = PoolEntry {
            transaction: tx,
            sender,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        index.insert(entry.key(), hash);
        self.by_sender
            .entry(sender)
            .or_default()
            .insert(entry.transaction.nonce, hash);
        trace!(tx = %hash, %sender, nonce = entry.transaction.nonce, "pooled");
        self.entries.insert(hash, entry);
        Ok(hash)
    }

    /// Next nonce for `address` without going through the async trait.
    pub fn pending_nonce(&self, address: &Address) -> u64 {
        let mut nonce = self.state.state_nonce(address);
        if let Some(queue) = self.by_sender.get(address) {
            while queue.contains_key(&nonce) {
                nonce += 1;
            }
        }
        nonce
    }

    /// Selects up to `max_count` transactions for a block: each sender's
    /// transactions in nonce order, senders interleaved by price.
    pub fn select_transactions(&self, max_count: usize) -> Vec<Transaction> {
        let mut queues: Vec<Vec<Transaction>> = self
            .by_sender
            .iter()
            .map(|q| {
                q.values()
                    .rev()
                    .filter_map(|h| self.entries.get(h).map(|e| e.transaction.clone()))
                    .collect()
            })
            .collect();

        let mut heads = BinaryHeap::new();
        for (i, queue) in queues.iter().enumerate() {
            if let Some(tx) = queue.last() {
                heads.push((tx.gas_price, Reverse(i)));
            }
        }

        let mut selected = Vec::with_capacity(max_count.min(self.entries.len()));
        while selected.len() < max_count {
            let Some((_, Reverse(i))) = heads.pop() else {
                break;
            };
            if let Some(tx) = queues[i].pop() {
                selected.push(tx);
            }
            if let Some(next) = queues[i].last() {
                heads.push((next.gas_price, Reverse(i)));
            }
        }
        selected
    }

    pub fn remove_batch(&self, hashes: &[B256]) -> usize {
        hashes.iter().filter(|h| self.remove_entry(h).is_some()).count()
    }

    /// Drops every transaction whose nonce the chain has already passed.
    pub fn prune_stale(&self) -> usize {
        let stale: Vec<B256> = self
            .entries
            .iter()
            .filter(|e| e.transaction.nonce < self.state.state_nonce(&e.sender))
            .map(|e| *e.key())
            .collect();
        self.remove_batch(&stale)
    }

    pub fn clear(&self) {
        let mut index = self.price_index.write();
        index.clear();
        self.entries.clear();
        self.by_sender.clear();
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn slot(&self, sender: &Address, nonce: u64) -> Option<B256> {
        self.by_sender.get(sender).and_then(|q| q.get(&nonce).copied())
    }

    fn remove_entry(&self, hash: &B256) -> Option<Transaction> {
        let mut index = self.price_index.write();
        let (_, entry) = self.entries.remove(hash)?;
        index.remove(&entry.key());
        self.unlink_sender(&entry);
        Some(entry.transaction)
    }

    fn unlink_sender(&self, entry: &PoolEntry) {
        let emptied = match self.by_sender.get_mut(&entry.sender) {
            Some(mut queue) => {
                if queue.get(&entry.transaction.nonce) == Some(&entry.transaction.hash()) {
                    queue.remove(&entry.transaction.nonce);
                }
                queue.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_sender.remove_if(&entry.sender, |_, q| q.is_empty());
        }
    }

    fn evict_cheapest(&self, index: &mut BTreeMap<PriceKey, B256>, incoming: U256) -> bool {
        // Ascending order puts the lowest price last.
        let cheapest = match index.keys().next_back() {
            Some(key) => key.clone(),
            None => return false,
        };
        if incoming <= cheapest.price.0 {
            return false;
        }
        index.remove(&cheapest);
        if let Some((_, entry)) = self.entries.remove(&cheapest.hash) {
            self.unlink_sender(&entry);
            debug!(evicted = %cheapest.hash, "pool full, evicted cheapest transaction");
        }
        true
    }
}

#[async_trait]
impl PendingPool for TxPool {
    async fn add(&self, tx: Transaction) -> Result<(), PoolError> {
        self.insert(tx).map(|_| ())
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64, PoolError> {
        Ok(self.pending_nonce(address))
    }

    fn pending(&self) -> Vec<Transaction> {
        let index = self.price_index.read();
        index
            .values()
            .filter_map(|h| self.entries.get(h).map(|e| e.transaction.clone()))
            .collect()
    }

    fn pending_from(&self, address: &Address) -> Vec<Transaction> {
        self.by_sender
            .get(address)
            .map(|q| {
                q.values()
                    .filter_map(|h| self.entries.get(h).map(|e| e.transaction.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get(&self, hash: &B256) -> Option<Transaction> {
        self.entries.get(hash).map(|e| e.transaction.clone())
    }

    fn remove(&self, hash: &B256) -> Option<Transaction> {
        self.remove_entry(hash)
    }
}

/// `price * (100 + percent) / 100`, rounded up.
fn bumped(price: U256, percent: u64) -> U256 {
    let scaled = price.saturating_mul(U256::from(100 + percent));
    scaled.saturating_add(U256::from(99u64)) / U256::from(100u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::storage::{Genesis, GenesisAccount};
    use crate::transaction::{sign_transaction, Category, TransactionBuilder};

    struct Fixture {
        chain: Arc<DevChain>,
        alice: Keypair,
        bob: Keypair,
    }

    fn fixture() -> Fixture {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let mut genesis = Genesis::default();
        for key in [&alice, &bob] {
            genesis.alloc.insert(
                key.address(),
                GenesisAccount {
                    balance: U256::from(10_000_000u64),
                    ..Default::default()
                },
            );
        }
        Fixture {
            chain: Arc::new(DevChain::new(&genesis)),
            alice,
            bob,
        }
    }

    fn pool_with(fx: &Fixture, config: PoolConfig) -> TxPool {
        TxPool::new(fx.chain.clone(), config)
    }

    fn tx(key: &Keypair, nonce: u64, price: u64) -> Transaction {
        let unsigned = TransactionBuilder::new(Category::NORMAL)
            .to(Address::repeat_byte(0x33))
            .value(U256::from(1u64))
            .gas(21_000)
            .gas_price(U256::from(price))
            .nonce(nonce)
            .build();
        sign_transaction(unsigned, key, Some(1337)).unwrap()
    }

    #[tokio::test]
    async fn add_get_and_next_nonce() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let first = tx(&fx.alice, 0, 1);
        let hash = first.hash();

        assert_eq!(pool.next_nonce(&fx.alice.address()).await.unwrap(), 0);
        pool.add(first.clone()).await.unwrap();
        assert_eq!(pool.get(&hash), Some(first));
        assert_eq!(pool.next_nonce(&fx.alice.address()).await.unwrap(), 1);

        // A gap does not advance the next nonce.
        pool.add(tx(&fx.alice, 2, 1)).await.unwrap();
        assert_eq!(pool.next_nonce(&fx.alice.address()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_duplicates() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let t = tx(&fx.alice, 0, 1);
        pool.add(t.clone()).await.unwrap();
        match pool.add(t.clone()).await {
            Err(PoolError::AlreadyKnown(h)) => assert_eq!(h, t.hash()),
            other => panic!("expected AlreadyKnown, got {:?}", other),
        }
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn rejects_unsigned() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let unsigned = TransactionBuilder::new(Category::NORMAL)
            .to(Address::repeat_byte(1))
            .gas(21_000)
            .build();
        match pool.add(unsigned).await {
            Err(PoolError::InvalidSender(_)) => {}
            other => panic!("expected InvalidSender, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_underpriced() {
        let fx = fixture();
        let pool = pool_with(
            &fx,
            PoolConfig {
                min_gas_price: U256::from(5u64),
                ..Default::default()
            },
        );
        match pool.add(tx(&fx.alice, 0, 4)).await {
            Err(PoolError::Underpriced { .. }) => {}
            other => panic!("expected Underpriced, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_insufficient_funds() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let stranger = Keypair::generate();
        match pool.add(tx(&stranger, 0, 1)).await {
            Err(PoolError::InsufficientFunds { balance, .. }) => assert_eq!(balance, U256::ZERO),
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn replacement_needs_price_bump() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        pool.add(tx(&fx.alice, 0, 100)).await.unwrap();

        match pool.add(tx(&fx.alice, 0, 109)).await {
            Err(PoolError::ReplacementUnderpriced { required, .. }) => {
                assert_eq!(required, U256::from(110u64))
            }
            other => panic!("expected ReplacementUnderpriced, got {:?}", other),
        }

        let better = tx(&fx.alice, 0, 110);
        pool.add(better.clone()).await.unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.pending_from(&fx.alice.address()), vec![better]);
    }

    #[tokio::test]
    async fn per_sender_limit() {
        let fx = fixture();
        let pool = pool_with(
            &fx,
            PoolConfig {
                max_per_sender: 2,
                ..Default::default()
            },
        );
        pool.add(tx(&fx.alice, 0, 1)).await.unwrap();
        pool.add(tx(&fx.alice, 1, 1)).await.unwrap();
        match pool.add(tx(&fx.alice, 2, 1)).await {
            Err(PoolError::SenderLimitExceeded { limit, .. }) => assert_eq!(limit, 2),
            other => panic!("expected SenderLimitExceeded, got {:?}", other),
        }
        pool.add(tx(&fx.bob, 0, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn full_pool_evicts_cheapest_or_rejects() {
        let fx = fixture();
        let pool = pool_with(
            &fx,
            PoolConfig {
                max_size: 2,
                ..Default::default()
            },
        );
        let cheap = tx(&fx.alice, 0, 1);
        pool.add(cheap.clone()).await.unwrap();
        pool.add(tx(&fx.alice, 1, 5)).await.unwrap();

        match pool.add(tx(&fx.bob, 0, 1)).await {
            Err(PoolError::PoolFull { size }) => assert_eq!(size, 2),
            other => panic!("expected PoolFull, got {:?}", other),
        }

        pool.add(tx(&fx.bob, 0, 9)).await.unwrap();
        assert_eq!(pool.size(), 2);
        assert!(!pool.contains(&cheap.hash()));
    }

    #[tokio::test]
    async fn pending_is_price_ordered() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        pool.add(tx(&fx.alice, 0, 3)).await.unwrap();
        pool.add(tx(&fx.bob, 0, 7)).await.unwrap();
        pool.add(tx(&fx.alice, 1, 5)).await.unwrap();

        let prices: Vec<U256> = pool.pending().iter().map(|t| t.gas_price).collect();
        assert_eq!(prices, vec![U256::from(7u64), U256::from(5u64), U256::from(3u64)]);
    }

    #[tokio::test]
    async fn selection_respects_nonce_order() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        pool.add(tx(&fx.alice, 0, 1)).await.unwrap();
        pool.add(tx(&fx.alice, 1, 50)).await.unwrap();
        pool.add(tx(&fx.bob, 0, 10)).await.unwrap();

        let selected = pool.select_transactions(10);
        let alice: Vec<u64> = selected
            .iter()
            .filter(|t| recover_sender(t).unwrap() == fx.alice.address())
            .map(|t| t.nonce)
            .collect();
        assert_eq!(alice, vec![0, 1]);
        assert_eq!(selected[0].gas_price, U256::from(10u64));
        assert_eq!(pool.select_transactions(1).len(), 1);
    }

    #[tokio::test]
    async fn sealing_then_pruning() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let first = tx(&fx.alice, 0, 1);
        pool.add(first.clone()).await.unwrap();

        fx.chain.seal_block(vec![first.clone()], Address::ZERO, 1);
        assert_eq!(pool.prune_stale(), 1);
        assert!(pool.is_empty());

        match pool.add(first).await {
            Err(PoolError::NonceTooLow { have: 0, want: 1 }) => {}
            other => panic!("expected NonceTooLow, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn remove_unlinks_everything() {
        let fx = fixture();
        let pool = pool_with(&fx, PoolConfig::default());
        let t = tx(&fx.alice, 0, 1);
        pool.add(t.clone()).await.unwrap();
        assert_eq!(PendingPool::remove(&pool, &t.hash()), Some(t.clone()));
        assert!(pool.pending().is_empty());
        assert!(pool.pending_from(&fx.alice.address()).is_empty());
        assert_eq!(pool.pending_nonce(&fx.alice.address()), 0);
        assert_eq!(pool.remove_batch(&[t.hash()]), 0);
    }

    #[test]
    fn bump_rounds_up() {
        assert_eq!(bumped(U256::from(100u64), 10), U256::from(110u64));
        assert_eq!(bumped(U256::from(1u64), 10), U256::from(2u64));
        assert_eq!(bumped(U256::ZERO, 10), U256::ZERO);
    }
}
