//! # Devnet Block Production
//!
//! The `BlockProducer` turns pending transactions into blocks on the
//! in-memory chain so that nonces advance and submitted transactions become
//! visible to `latest` state.
//!
//! ```text
//! 1. SELECT — per-sender nonce order, senders interleaved by gas price
//! 2. SEAL   — DevChain applies each transaction, drops failures
//! 3. PURGE  — included and rejected hashes leave the pool, stale nonces too
//! ```
//!
//! There is no consensus here: a single devnet node seals on a timer.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use super::mempool::TxPool;
use crate::storage::{DevChain, SealedBlock};

/// Loop timing and throughput.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub block_time_ms: u64,
    pub max_block_transactions: usize,
    /// Seal blocks even when the pool is empty.
    pub seal_empty: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            block_time_ms: 2_000,
            max_block_transactions: 512,
            seal_empty: false,
        }
    }
}

pub struct BlockProducer {
    chain: Arc<DevChain>,
    pool: Arc<TxPool>,
    coinbase: Address,
    config: ProducerConfig,
}

impl BlockProducer {
    pub fn new(
        chain: Arc<DevChain>,
        pool: Arc<TxPool>,
        coinbase: Address,
        config: ProducerConfig,
    ) -> Self {
        Self {
            chain,
            pool,
            coinbase,
            config,
        }
    }

    /// Seals one block. Returns `None` when the pool is empty and empty
    /// blocks are disabled.
    pub fn produce_once(&self) -> Option<SealedBlock> {
        if self.pool.is_empty() && !self.config.seal_empty {
            return None;
        }

        let candidates = self
            .pool
            .select_transactions(self.config.max_block_transactions);
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let sealed = self.chain.seal_block(candidates, self.coinbase, timestamp);

        let mut done = sealed.included.clone();
        done.extend(sealed.rejected.iter().map(|(hash, _)| *hash));
        let purged = self.pool.remove_batch(&done);
        let stale = self.pool.prune_stale();
        debug!(purged, stale, remaining = self.pool.size(), "pool purged after sealing");

        Some(sealed)
    }

    /// Seals on a timer until `shutdown` flips to `true` or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            block_time_ms = self.config.block_time_ms,
            coinbase = %self.coinbase,
            "block producer starting"
        );
        let period = Duration::from_millis(self.config.block_time_ms.max(1));

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(sealed) = self.produce_once() {
                if !sealed.rejected.is_empty() {
                    debug!(
                        number = sealed.header.number,
                        rejected = sealed.rejected.len(),
                        "some transactions failed during sealing"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("block producer stopped");
    }
}
