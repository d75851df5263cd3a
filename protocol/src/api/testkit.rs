//! Devnet fixture shared by the API unit tests.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};

use super::backend::{Backend, FixedPriceOracle};
use crate::config::ApiConfig;
use crate::network::mempool::{PoolConfig, TxPool};
use crate::storage::{DevChain, Genesis, GenesisAccount};
use crate::vault::{KeyManager, KeyStore};
use crate::vm::DevVmFactory;

pub struct TestNode {
    pub chain: Arc<DevChain>,
    pub pool: Arc<TxPool>,
    pub keystore: KeyStore,
    pub backend: Backend,
    /// Unlocked, coinbase, stock manager and local validator.
    pub alice: Address,
    /// Unlocked, holds 100 units of stock.
    pub bob: Address,
    /// Funded but never unlocked.
    pub locked: Address,
}

impl TestNode {
    pub const PASSPHRASE: &'static str = "correct horse";
    pub const PRICE: u64 = 1_000_000_000;

    pub fn new() -> Self {
        Self::build(Some(0), |_| {})
    }

    pub fn with_eip155(eip155_block: Option<u64>) -> Self {
        Self::build(eip155_block, |_| {})
    }

    /// Builds the fixture; `tweak` may add code or holdings to genesis.
    pub fn build(eip155_block: Option<u64>, tweak: impl FnOnce(&mut Genesis)) -> Self {
        let keystore = KeyStore::in_memory();
        let alice = keystore.new_account(Self::PASSPHRASE).unwrap();
        let bob = keystore.new_account(Self::PASSPHRASE).unwrap();
        let locked = keystore.new_account(Self::PASSPHRASE).unwrap();
        keystore.unlock(&alice, Self::PASSPHRASE, None).unwrap();
        keystore.unlock(&bob, Self::PASSPHRASE, None).unwrap();

        let mut genesis = Genesis::default();
        genesis.config.eip155_block = eip155_block;
        for address in [alice, bob, locked] {
            genesis.alloc.insert(
                address,
                GenesisAccount {
                    balance: U256::from(10u64).pow(U256::from(24u64)),
                    ..Default::default()
                },
            );
        }
        genesis.stock_manager = alice;
        genesis.holdings.insert(bob, 100);
        tweak(&mut genesis);

        let chain = Arc::new(DevChain::new(&genesis));
        let pool = Arc::new(TxPool::new(chain.clone(), PoolConfig::default()));
        let config = ApiConfig {
            coinbase: Some(alice),
            local_validator: Some(alice),
            ..Default::default()
        };
        let backend = Backend::new(
            chain.clone(),
            pool.clone(),
            Arc::new(FixedPriceOracle(U256::from(Self::PRICE))),
            Arc::new(keystore.clone()),
            Arc::new(DevVmFactory),
            config,
        );

        Self {
            chain,
            pool,
            keystore,
            backend,
            alice,
            bob,
            locked,
        }
    }

    /// Genesis tweak installing `code` at `address`.
    pub fn with_code(address: Address, code: Vec<u8>) -> impl FnOnce(&mut Genesis) {
        move |genesis| {
            genesis.alloc.insert(
                address,
                GenesisAccount {
                    code: Bytes::from(code),
                    ..Default::default()
                },
            );
        }
    }
}
