// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Sable Devnet Node
//!
//! Entry point for the `sable-node` binary. Parses CLI arguments, installs
//! logging and metrics, builds the devnet chain, pool and keystore, and
//! serves the transaction API while a block producer seals the pool.
//!
//! - `run`     start the node
//! - `init`    write a default config and create a keystore account
//! - `version` print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;

use sable_protocol::api::{Backend, FixedPriceOracle, GovernanceApi, PersonalApi, TransactionApi};
use sable_protocol::config::PROTOCOL_VERSION;
use sable_protocol::network::{BlockProducer, TxPool};
use sable_protocol::storage::DevChain;
use sable_protocol::vault::{KeyManager, KeyStore};
use sable_protocol::vm::DevVmFactory;

use cli::{Commands, SableNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

/// How often pool and height gauges are refreshed.
const GAUGE_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SableNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format);

    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    tracing::info!(
        rpc = %args.rpc_addr,
        metrics = %args.metrics_addr,
        chain_id = config.genesis.config.chain_id,
        "starting sable-node"
    );

    // --- Keystore ---
    let keystore = match &args.keystore {
        Some(dir) => KeyStore::open(dir)
            .with_context(|| format!("failed to open keystore {}", dir.display()))?,
        None => KeyStore::in_memory(),
    };
    for address in &args.unlock {
        keystore
            .unlock(address, &args.password, None)
            .with_context(|| format!("failed to unlock {address}"))?;
        tracing::info!(%address, "account unlocked");
    }

    // --- Chain, pool, facades ---
    let chain = Arc::new(DevChain::new(&config.genesis));
    let pool = Arc::new(TxPool::new(chain.clone(), config.pool.clone()));
    let backend = Backend::new(
        chain.clone(),
        pool.clone(),
        Arc::new(FixedPriceOracle(config.api.default_gas_price)),
        Arc::new(keystore.clone()),
        Arc::new(DevVmFactory),
        config.api.clone(),
    );
    let coinbase = backend.coinbase().unwrap_or(config.genesis.coinbase);
    let transactions = TransactionApi::new(backend);
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        chain: chain.clone(),
        pool: pool.clone(),
        personal: PersonalApi::new(Arc::new(keystore), transactions.clone()),
        governance: GovernanceApi::new(transactions.clone()),
        transactions,
        metrics: Arc::clone(&node_metrics),
    };

    // --- Listeners ---
    let api_listener = tokio::net::TcpListener::bind(args.rpc_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", args.rpc_addr))?;
    let metrics_listener = tokio::net::TcpListener::bind(args.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", args.metrics_addr))?;
    let api_router = api::create_router(app_state);
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    tracing::info!("RPC listening on {}, metrics on {}", args.rpc_addr, args.metrics_addr);

    // --- Background tasks ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let producer = BlockProducer::new(chain.clone(), pool.clone(), coinbase, config.producer);
    let producer_rx = shutdown_rx.clone();
    let producer_task = tokio::spawn(async move { producer.run(producer_rx).await });

    let gauges = Arc::clone(&node_metrics);
    let mut gauge_rx = shutdown_rx.clone();
    let gauge_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(GAUGE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    gauges.block_height.set(i64::try_from(chain.height()).unwrap_or(i64::MAX));
                    gauges.pool_size.set(i64::try_from(pool.size()).unwrap_or(i64::MAX));
                }
                _ = gauge_rx.changed() => break,
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(producer_task, gauge_task);
    tracing::info!("sable-node stopped");
    Ok(())
}

/// Writes `config.toml` and creates the first keystore account, which
/// becomes coinbase, stock manager and local validator of the new devnet.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("sable_node=info,sable_protocol=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    let config_path = data_dir.join("config.toml");
    if config_path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let keystore_dir = data_dir.join("keystore");
    let keystore = KeyStore::open(&keystore_dir)
        .with_context(|| format!("failed to open keystore {}", keystore_dir.display()))?;
    let operator = keystore
        .new_account(&args.password)
        .context("failed to create operator account")?;

    let config = devnet_config(operator);
    config.save(&config_path)?;

    tracing::info!(%operator, "devnet initialized");
    print_init_summary(data_dir, &keystore_dir, &config_path, operator);
    Ok(())
}

/// Devnet defaults with `operator` funded and in every governance role.
fn devnet_config(operator: alloy_primitives::Address) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.genesis.coinbase = operator;
    config.genesis.stock_manager = operator;
    config.genesis.alloc.insert(
        operator,
        sable_protocol::storage::GenesisAccount {
            balance: alloy_primitives::U256::from(10u64).pow(alloy_primitives::U256::from(24u64)),
            ..Default::default()
        },
    );
    config.api.coinbase = Some(operator);
    config.api.local_validator = Some(operator);
    config
}

fn print_init_summary(
    data_dir: &Path,
    keystore_dir: &Path,
    config_path: &Path,
    operator: alloy_primitives::Address,
) {
    println!("Node initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Keystore       : {}", keystore_dir.display());
    println!("  Operator       : {}", operator);
    println!();
    println!(
        "Start with: sable-node run -c {} -k {} --unlock {}",
        config_path.display(),
        keystore_dir.display(),
        operator
    );
}

fn print_version() {
    println!("sable-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT or SIGTERM. Only Ctrl+C on non-Unix platforms.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
