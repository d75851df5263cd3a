//! # CLI Interface
//!
//! Command-line arguments for `sable-node`, built with `clap` derive.
//! Three subcommands: `run`, `init` and `version`.

use std::net::SocketAddr;
use std::path::PathBuf;

use alloy_primitives::Address;
use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Sable devnet node.
///
/// Serves the transaction API over JSON-RPC, seals blocks from the pending
/// pool on a timer and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "sable-node",
    about = "Sable devnet node",
    version,
    propagate_version = true
)]
pub struct SableNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Write a default config and create a first keystore account.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Node configuration file (TOML). Built-in devnet defaults when absent.
    #[arg(long, short = 'c', env = "SABLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding keystore files. Keys live in memory only when absent.
    #[arg(long, short = 'k', env = "SABLE_KEYSTORE")]
    pub keystore: Option<PathBuf>,

    /// Address for the JSON-RPC and REST API.
    #[arg(long, env = "SABLE_RPC_ADDR", default_value = "127.0.0.1:8645")]
    pub rpc_addr: SocketAddr,

    /// Address for the Prometheus metrics endpoint.
    #[arg(long, env = "SABLE_METRICS_ADDR", default_value = "127.0.0.1:9645")]
    pub metrics_addr: SocketAddr,

    /// Accounts to unlock at startup, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub unlock: Vec<Address>,

    /// Passphrase for the accounts in `--unlock`.
    #[arg(long, env = "SABLE_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Default log filter. `RUST_LOG` wins when set.
    #[arg(long, env = "SABLE_LOG", default_value = "sable_node=info,sable_protocol=info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize. Receives `config.toml` and `keystore/`.
    #[arg(long, short = 'd', env = "SABLE_DATA_DIR", default_value = "./sable-data")]
    pub data_dir: PathBuf,

    /// Passphrase sealing the generated account.
    #[arg(long, env = "SABLE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Overwrite an existing `config.toml`.
    #[arg(long)]
    pub force: bool,
}
