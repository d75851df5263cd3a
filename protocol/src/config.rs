//! # Protocol Configuration & Constants
//!
//! Every magic number in Sable lives here. Gas constants, payload caps and
//! the defaults the transaction builder falls back on are all defined once
//! and referenced everywhere else.
//!
//! Runtime knobs (chain identity, API defaults) are plain serde structs with
//! sensible `Default` impls so the node can load them from TOML and tests can
//! construct them inline.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Chain id of the public network.
pub const CHAIN_ID_MAINNET: u64 = 7_221;

/// Chain id used by the devnet node and the test suites.
pub const CHAIN_ID_DEVNET: u64 = 1_337;

/// Protocol version string reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Gas
// ---------------------------------------------------------------------------

/// Minimum gas any transaction pays. Nothing executes below this floor, which
/// is why the gas estimator starts its search one unit beneath it.
pub const TX_GAS: u64 = 21_000;

/// Intrinsic gas of a contract-creation transaction, in place of [`TX_GAS`].
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;

/// Intrinsic gas per zero byte of payload.
pub const TX_DATA_ZERO_GAS: u64 = 4;

/// Intrinsic gas per non-zero byte of payload.
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;

/// Gas charged per byte of code deposited by a contract creation.
pub const CREATE_DATA_GAS: u64 = 200;

/// Gas allowance used when an intent omits one.
pub const DEFAULT_GAS: u64 = 90_000;

/// Gas allowance used by calls that omit one. Large enough to never be the
/// binding constraint for a read.
pub const CALL_GAS_CAP: u64 = 50_000_000;

/// Gas price (wei) applied to simulations that omit one: 18 gwei.
pub const DEFAULT_GAS_PRICE: u64 = 18_000_000_000;

/// Block gas limit of the devnet genesis block.
pub const GENESIS_GAS_LIMIT: u64 = 8_000_000;

// ---------------------------------------------------------------------------
// Payload Bounds
// ---------------------------------------------------------------------------

/// Hard cap on the auxiliary `extra` payload: 1 MiB.
pub const MAX_EXTRA_SIZE: usize = 1024 * 1024;

/// Hard cap on the `data` payload. Creations carry whole contracts, so this is
/// generous, but it is still a cap.
pub const MAX_DATA_SIZE: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Wall-clock bound on unmetered calls.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Maximum number of transactions the devnet pool holds.
pub const POOL_MAX_SIZE: usize = 4_096;

/// Maximum pending transactions per sender.
pub const POOL_MAX_PER_SENDER: usize = 64;

/// A same-nonce replacement must raise the gas price by at least this
/// percentage.
pub const POOL_PRICE_BUMP_PERCENT: u64 = 10;

// ---------------------------------------------------------------------------
// Keystore
// ---------------------------------------------------------------------------

/// AES-256 key length for sealed key files.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM nonce length.
pub const AES_NONCE_LENGTH: usize = 12;

/// How long `unlock_account` keeps a key unlocked when no duration is given.
pub const DEFAULT_UNLOCK_SECONDS: u64 = 300;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Chain identity and fork schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain id bound into replay-protected signatures.
    pub chain_id: u64,
    /// First block at which signatures carry the chain id. `None` disables
    /// replay protection entirely.
    pub eip155_block: Option<u64>,
}

impl ChainConfig {
    /// Returns `true` if signatures produced at `number` must be bound to the
    /// chain id.
    pub fn is_eip155(&self, number: u64) -> bool {
        matches!(self.eip155_block, Some(activation) if number >= activation)
    }

    /// Devnet chain with replay protection active from genesis.
    pub fn devnet() -> Self {
        Self {
            chain_id: CHAIN_ID_DEVNET,
            eip155_block: Some(0),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

/// Defaults and identity used by the transaction API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Gas assigned to intents without an explicit allowance.
    pub default_gas: u64,
    /// Gas assigned to calls without an explicit allowance.
    pub call_gas_cap: u64,
    /// Gas price assigned to calls without an explicit price.
    pub default_gas_price: U256,
    /// Timeout for unmetered calls, in milliseconds.
    pub call_timeout_ms: u64,
    /// Origin tag stamped onto every admitted transaction.
    pub origin_tag: String,
    /// Block producer address. Falls back to the first local account.
    pub coinbase: Option<Address>,
    /// Validator identity configured on this node.
    pub local_validator: Option<Address>,
}

impl ApiConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_gas: DEFAULT_GAS,
            call_gas_cap: CALL_GAS_CAP,
            default_gas_price: U256::from(DEFAULT_GAS_PRICE),
            call_timeout_ms: CALL_TIMEOUT.as_millis() as u64,
            origin_tag: "127.0.0.1".to_string(),
            coinbase: None,
            local_validator: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_are_distinct() {
        assert_ne!(CHAIN_ID_MAINNET, CHAIN_ID_DEVNET);
    }

    #[test]
    fn gas_defaults_clear_the_floor() {
        assert!(DEFAULT_GAS > TX_GAS);
        assert!(CALL_GAS_CAP > GENESIS_GAS_LIMIT);
        assert!(GENESIS_GAS_LIMIT > TX_GAS + TX_GAS_CONTRACT_CREATION);
    }

    #[test]
    fn extra_cap_is_one_mebibyte() {
        assert_eq!(MAX_EXTRA_SIZE, 1_048_576);
    }

    #[test]
    fn eip155_activation() {
        let config = ChainConfig {
            chain_id: 5,
            eip155_block: Some(10),
        };
        assert!(!config.is_eip155(9));
        assert!(config.is_eip155(10));
        assert!(config.is_eip155(11));

        let legacy = ChainConfig {
            chain_id: 5,
            eip155_block: None,
        };
        assert!(!legacy.is_eip155(u64::MAX));
    }

    #[test]
    fn api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.default_gas, 90_000);
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_gas_price, U256::from(18_000_000_000u64));
        assert!(config.coinbase.is_none());
    }

    #[test]
    fn api_config_partial_toml_like_json() {
        let config: ApiConfig = serde_json::from_str(r#"{ "default_gas": 100000 }"#).unwrap();
        assert_eq!(config.default_gas, 100_000);
        assert_eq!(config.call_gas_cap, CALL_GAS_CAP);
    }
}
