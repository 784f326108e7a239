//! JSON-RPC backed [`ChainClient`].
//!
//! The chain server is reached over HTTP with three methods:
//! `getbestblock`, `getcurrenttarget` and `getkernelstakemodifier`.
//! Network parameters are answered locally from configuration.
//!
//! [`ChainClient`] is synchronous. [`RpcChainClient`] drives each request to
//! completion on the runtime it was connected from, so it must be called from
//! a blocking thread (`spawn_blocking`), never from inside an async task.

use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ppcmint_core::constants::NetParams;
use ppcmint_core::error::ChainError;
use ppcmint_core::traits::ChainClient;
use ppcmint_core::types::{BlockStamp, Hash256};

use crate::error::NodeError;

/// Chain tip as reported by `getbestblock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBlockJson {
    pub height: u64,
    /// Block hash as hex.
    pub hash: String,
}

/// Methods the minter needs from the chain server.
#[rpc(server, client)]
pub trait ChainRpc {
    #[method(name = "getbestblock")]
    async fn get_best_block(&self) -> Result<BestBlockJson, ErrorObjectOwned>;

    /// Compact proof-of-stake target for the next block.
    #[method(name = "getcurrenttarget")]
    async fn get_current_target(&self) -> Result<u32, ErrorObjectOwned>;

    #[method(name = "getkernelstakemodifier")]
    async fn get_kernel_stake_modifier(&self, hash: String) -> Result<u64, ErrorObjectOwned>;
}

/// Parse a 64-character hex string into a Hash256.
pub fn parse_hash(hex_str: &str) -> Result<Hash256, ChainError> {
    let bytes = hex::decode(hex_str)
        .map_err(|_| ChainError::Malformed(format!("invalid hex hash: {hex_str}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ChainError::Malformed(format!("hash must be 32 bytes: {hex_str}")))?;
    Ok(Hash256(arr))
}

pub struct RpcChainClient {
    client: HttpClient,
    params: NetParams,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl RpcChainClient {
    /// Build a client for `endpoint`. Must be called from within a tokio runtime.
    pub fn connect(endpoint: &str, params: NetParams) -> Result<Self, NodeError> {
        let runtime = Handle::try_current().map_err(|e| NodeError::Runtime(e.to_string()))?;
        let client = HttpClientBuilder::default()
            .build(endpoint)
            .map_err(|e| NodeError::Rpc(format!("chain client for {endpoint}: {e}")))?;
        Ok(Self {
            client,
            params,
            runtime,
            shutdown: CancellationToken::new(),
        })
    }

    /// Fail every pending and future request with [`ChainError::Disconnected`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn call<T, E: std::fmt::Display>(
        &self,
        method: &str,
        request: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ChainError> {
        if self.shutdown.is_cancelled() {
            return Err(ChainError::Disconnected);
        }
        self.runtime.block_on(async {
            tokio::select! {
                _ = self.shutdown.cancelled() => Err(ChainError::Disconnected),
                result = request => result.map_err(|e| {
                    debug!(method, "chain rpc failed: {e}");
                    ChainError::Rpc(format!("{method}: {e}"))
                }),
            }
        })
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("params", &self.params)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ChainClient for RpcChainClient {
    fn block_stamp(&self) -> Result<BlockStamp, ChainError> {
        let best = self.call("getbestblock", self.client.get_best_block())?;
        Ok(BlockStamp {
            height: best.height,
            hash: parse_hash(&best.hash)?,
        })
    }

    fn current_target(&self) -> Result<u32, ChainError> {
        self.call("getcurrenttarget", self.client.get_current_target())
    }

    fn params(&self) -> Result<NetParams, ChainError> {
        if self.shutdown.is_cancelled() {
            return Err(ChainError::Disconnected);
        }
        Ok(self.params.clone())
    }

    fn kernel_stake_modifier(&self, block_hash: &Hash256) -> Result<u64, ChainError> {
        let hash = hex::encode(block_hash.as_bytes());
        self.call(
            "getkernelstakemodifier",
            self.client.get_kernel_stake_modifier(hash),
        )
    }
}
