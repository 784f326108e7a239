//! # ppcmint-node: service composition for the minter.
//!
//! - [`config::MinterConfig`]: layered configuration (defaults, TOML, environment)
//! - [`chain::RpcChainClient`]: chain server access over JSON-RPC
//! - [`rpc`]: JSON-RPC server for stake search and minting controls
//! - [`error::NodeError`]: service errors

pub mod chain;
pub mod config;
pub mod error;
pub mod rpc;

pub use chain::RpcChainClient;
pub use config::MinterConfig;
pub use error::NodeError;
pub use rpc::{RpcServerImpl, start_rpc_server};
