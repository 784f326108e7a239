//! ppcmint daemon.
//!
//! Loads the wallet store, connects to a chain server over JSON-RPC, serves
//! the minter's own JSON-RPC interface, and runs the minting worker until
//! Ctrl+C. On shutdown the worker is stopped and waited for, and a dirty
//! store is flushed to disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use ppcmint_consensus::PeercoinKernel;
use ppcmint_core::constants::Network;
use ppcmint_core::traits::ChainClient;
use ppcmint_node::{MinterConfig, RpcChainClient, RpcServerImpl, start_rpc_server};
use ppcmint_wallet::{MemoryTxStore, Minter, Staker};

/// How often the chain server is polled to decide whether minting may run.
const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Proof-of-stake minter for Peercoin-style wallets.
#[derive(Parser, Debug)]
#[command(name = "ppcmint", version, about = "Proof-of-stake minter with JSON-RPC control")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "PPCMINT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the wallet store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Wallet store snapshot (defaults to <data_dir>/<network>/wallet.json)
    #[arg(long)]
    store_file: Option<PathBuf>,

    /// Chain server JSON-RPC endpoint
    #[arg(long)]
    chain_rpc: Option<String>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,

    /// Use test network parameters
    #[arg(long)]
    testnet: bool,

    /// Start minting immediately
    #[arg(long)]
    mint: bool,
}

impl Args {
    /// Load the layered configuration and apply command-line overrides.
    fn into_config(self) -> Result<MinterConfig> {
        let mut config = MinterConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;

        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(store_file) = self.store_file {
            config.store_file = Some(store_file);
        }
        if let Some(endpoint) = self.chain_rpc {
            config.chain_rpc_endpoint = endpoint;
        }
        if let Some(bind) = self.rpc_bind {
            config.rpc_bind = bind;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if self.testnet {
            config.network = Network::Testnet;
        }
        if self.mint {
            config.mint_on_start = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;

    init_logging(&config.log_level, &config.log_format);

    info!("ppcmint v{}", env!("CARGO_PKG_VERSION"));
    info!("network: {:?}", config.network);
    info!("data_dir: {:?}", config.data_dir);
    info!("chain_rpc: {}", config.chain_rpc_endpoint);
    info!("rpc_addr: {}", config.rpc_addr());

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data_dir {:?}", config.data_dir))?;

    let store_path = config.store_path();
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create store directory {parent:?}"))?;
    }
    let store = if store_path.exists() {
        MemoryTxStore::load_from_file(&store_path)
            .with_context(|| format!("failed to load wallet store {store_path:?}"))?
    } else {
        info!("no wallet store at {:?}, starting empty", store_path);
        MemoryTxStore::new()
    };
    let store = Arc::new(store);
    info!("wallet outputs: {}", store.output_count());

    let params = config.net_params();
    let chain = Arc::new(
        RpcChainClient::connect(&config.chain_rpc_endpoint, params.clone())
            .context("failed to create chain client")?,
    );
    let kernel = Arc::new(PeercoinKernel::new(params.stake_max_age));
    let staker = Arc::new(Staker::new(chain.clone(), store.clone(), kernel));
    let minter = Arc::new(Minter::new(staker.clone()));

    let shutdown = CancellationToken::new();
    let background = TaskTracker::new();
    background.spawn(watch_chain_sync(chain.clone(), staker.clone(), shutdown.clone()));
    if config.flush_interval_secs > 0 {
        background.spawn(flush_periodically(
            store.clone(),
            store_path.clone(),
            Duration::from_secs(config.flush_interval_secs),
            shutdown.clone(),
        ));
    }
    background.close();

    let rpc_impl = RpcServerImpl::new(staker.clone(), minter.clone(), shutdown.clone());
    let rpc_handle = start_rpc_server(&config.rpc_addr(), rpc_impl)
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {}", config.rpc_addr());

    if config.mint_on_start {
        minter.start().await;
    }

    info!("ppcmint running (Ctrl+C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("received Ctrl+C, shutting down...");

    shutdown.cancel();
    chain.shutdown();
    minter.stop().await;
    minter.wait_for_shutdown().await;
    background.wait().await;

    match store.flush_if_dirty(&store_path) {
        Ok(true) => info!("wallet store flushed to {:?}", store_path),
        Ok(false) => {}
        Err(e) => error!("failed to flush wallet store: {e}"),
    }

    rpc_handle.stop().ok();
    rpc_handle.stopped().await;
    info!("ppcmint shutdown complete");
    Ok(())
}

/// Mark the staker synced while the chain server answers, unsynced otherwise.
async fn watch_chain_sync(chain: Arc<RpcChainClient>, staker: Arc<Staker>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(SYNC_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let probe = chain.clone();
                let synced = match tokio::task::spawn_blocking(move || probe.block_stamp()).await {
                    Ok(Ok(stamp)) => {
                        if !staker.chain_synced() {
                            info!(height = stamp.height, hash = %stamp.hash, "chain server reachable");
                        }
                        true
                    }
                    Ok(Err(e)) => {
                        if staker.chain_synced() {
                            warn!("chain server unavailable: {e}");
                        }
                        false
                    }
                    Err(e) => {
                        error!("chain probe aborted: {e}");
                        false
                    }
                };
                staker.set_chain_synced(synced);
            }
        }
    }
}

async fn flush_periodically(
    store: Arc<MemoryTxStore>,
    path: PathBuf,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = store.flush_if_dirty(&path) {
                    warn!("periodic store flush failed: {e}");
                }
            }
        }
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
