//! Minter configuration.
//!
//! [`MinterConfig`] is layered with the `config` crate: built-in defaults,
//! then an optional TOML file, then `PPCMINT_*` environment variables
//! (e.g. `PPCMINT_RPC_PORT=9905`, `PPCMINT_NETWORK=testnet`). Command-line
//! flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use ppcmint_core::constants::{DEFAULT_RPC_PORT, NetParams, Network};

use crate::error::NodeError;

/// Prefix of environment variables read by [`MinterConfig::load`].
pub const ENV_PREFIX: &str = "PPCMINT";

/// Chain server JSON-RPC endpoint used when none is configured.
pub const DEFAULT_CHAIN_RPC_ENDPOINT: &str = "http://127.0.0.1:9902";

/// Configuration for a minter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinterConfig {
    pub network: Network,
    /// Root directory for persistent data.
    pub data_dir: PathBuf,
    /// Wallet store snapshot. Defaults to `<data_dir>/<network>/wallet.json`.
    pub store_file: Option<PathBuf>,
    /// JSON-RPC endpoint of the chain server.
    pub chain_rpc_endpoint: String,
    /// IP address for the minter's own JSON-RPC server.
    pub rpc_bind: String,
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "ppcmint_wallet=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
    /// Start the minting worker as soon as the service is up.
    pub mint_on_start: bool,
    /// Replaces the network's minimum stake age (seconds).
    pub stake_min_age: Option<i64>,
    /// Seconds between flushes of a dirty store. Zero disables periodic flushes.
    pub flush_interval_secs: u64,
}

impl Default for MinterConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ppcmint");

        Self {
            network: Network::default(),
            data_dir,
            store_file: None,
            chain_rpc_endpoint: DEFAULT_CHAIN_RPC_ENDPOINT.to_string(),
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            mint_on_start: false,
            stake_min_age: None,
            flush_interval_secs: 60,
        }
    }
}

impl MinterConfig {
    /// Load defaults, then `path` if given, then the environment.
    ///
    /// A missing file is an error only when a path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, NodeError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let config = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the wallet store snapshot. Each network keeps its own.
    pub fn store_path(&self) -> PathBuf {
        self.store_file.clone().unwrap_or_else(|| {
            self.data_dir
                .join(self.network.data_dir_suffix())
                .join("wallet.json")
        })
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }

    /// Network parameters with the configured overrides applied.
    pub fn net_params(&self) -> NetParams {
        let mut params = NetParams::for_network(self.network);
        if let Some(min_age) = self.stake_min_age {
            params.stake_min_age = min_age;
        }
        params
    }
}
