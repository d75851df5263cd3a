//! # Node Configuration
//!
//! The TOML file read by `sable-node run --config`. Every section is
//! optional and falls back to devnet defaults.
//!
//! ```toml
//! [genesis]
//! stock_manager = "0x..."
//! validators = ["0x..."]
//!
//! [genesis.config]
//! chain_id = 1337
//! eip155_block = 0
//!
//! [genesis.alloc."0x..."]
//! balance = "0x3635c9adc5dea00000"
//!
//! [genesis.holdings]
//! "0x..." = 100
//!
//! [api]
//! origin_tag = "10.0.0.7"
//!
//! [pool]
//! [producer]
//! block_time_ms = 2000
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sable_protocol::config::ApiConfig;
use sable_protocol::network::{PoolConfig, ProducerConfig};
use sable_protocol::storage::Genesis;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub genesis: Genesis,
    pub api: ApiConfig,
    pub pool: PoolConfig,
    pub producer: ProducerConfig,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(self).context("failed to render config")?;
        fs::write(path, rendered)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}
