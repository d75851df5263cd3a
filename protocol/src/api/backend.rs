//! Collaborator bundle shared by the API facades.
//!
//! [`Backend`] is nothing but the set of narrow interfaces the transaction
//! layer depends on, plus its configuration. Production nodes plug their own
//! implementations in; the devnet node and the tests use [`DevChain`],
//! [`TxPool`], [`KeyStore`], [`DevVmFactory`] and [`FixedPriceOracle`].
//!
//! [`DevChain`]: crate::storage::DevChain
//! [`TxPool`]: crate::network::TxPool
//! [`KeyStore`]: crate::vault::KeyStore
//! [`DevVmFactory`]: crate::vm::DevVmFactory

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use super::error::{ApiError, BackendError};
use crate::config::ApiConfig;
use crate::network::mempool::PendingPool;
use crate::storage::ChainReader;
use crate::vault::AccountRegistry;
use crate::vm::VmFactory;

/// Gas price suggestions.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn suggest_price(&self) -> Result<U256, BackendError>;
}

/// Always suggests the same price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPriceOracle(pub U256);

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn suggest_price(&self) -> Result<U256, BackendError> {
        Ok(self.0)
    }
}

#[derive(Clone)]
pub struct Backend {
    pub chain: Arc<dyn ChainReader>,
    pub pool: Arc<dyn PendingPool>,
    pub oracle: Arc<dyn PriceOracle>,
    pub accounts: Arc<dyn AccountRegistry>,
    pub vm: Arc<dyn VmFactory>,
    pub config: ApiConfig,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("chain_id", &self.chain.chain_config().chain_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Backend {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        pool: Arc<dyn PendingPool>,
        oracle: Arc<dyn PriceOracle>,
        accounts: Arc<dyn AccountRegistry>,
        vm: Arc<dyn VmFactory>,
        config: ApiConfig,
    ) -> Self {
        Self {
            chain,
            pool,
            oracle,
            accounts,
            vm,
            config,
        }
    }

    /// The actor for governance operations: the configured coinbase, else
    /// the first local account.
    pub fn coinbase(&self) -> Result<Address, ApiError> {
        self.config
            .coinbase
            .or_else(|| self.accounts.accounts().first().copied())
            .ok_or(ApiError::NoCoinbase)
    }

    pub async fn suggest_price(&self) -> Result<U256, ApiError> {
        self.oracle
            .suggest_price()
            .await
            .map_err(|e| ApiError::PriceOracle(e.to_string()))
    }
}
