//! JSON-RPC server for the minter.
//!
//! Uses jsonrpsee 0.24 to expose the diagnostic stake search and the minting
//! worker controls:
//!
//! - `findstake [maxtime] [difficulty]`: every timestamp up to `maxtime` at
//!   which a wallet output would mint, with the best difficulty it would
//!   still mint at
//! - `startminting` / `stopminting`: idempotent worker controls
//! - `getmintinginfo`: worker state and counters

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ppcmint_core::types::FoundStake;
use ppcmint_wallet::{KernelFound, MintError, Minter, Staker};

use crate::error::NodeError;

/// JSON representation of a kernel found by the minting worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelJson {
    /// Staked output as `txid:index`.
    pub outpoint: String,
    /// Credit in base units.
    pub credit: u64,
    /// Coin-stake timestamp (Unix seconds).
    pub time: i64,
    /// Kernel hash as hex.
    pub hash: String,
}

impl From<&KernelFound> for KernelJson {
    fn from(kernel: &KernelFound) -> Self {
        Self {
            outpoint: kernel.outpoint.to_string(),
            credit: kernel.credit,
            time: kernel.tx_time,
            hash: hex::encode(kernel.hash.as_bytes()),
        }
    }
}

/// JSON representation of minting worker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintingInfoJson {
    pub running: bool,
    /// Completed search passes.
    pub passes: u64,
    pub kernels_found: u64,
    pub failed_passes: u64,
    pub last_kernel: Option<KernelJson>,
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn mint_error(e: MintError) -> ErrorObjectOwned {
    match e {
        MintError::Difficulty(_) => rpc_error(-8, &e.to_string()),
        _ => rpc_error(-1, &e.to_string()),
    }
}

/// The minter JSON-RPC interface.
#[rpc(server)]
pub trait MintingRpc {
    /// Runs the diagnostic stake search. `maxtime` defaults to 30 days from
    /// now; a zero or absent `difficulty` uses the live network target.
    #[method(name = "findstake")]
    async fn find_stake(
        &self,
        maxtime: Option<i64>,
        difficulty: Option<f64>,
    ) -> Result<Vec<FoundStake>, ErrorObjectOwned>;

    /// Starts the minting worker. Returns whether it is running.
    #[method(name = "startminting")]
    async fn start_minting(&self) -> Result<bool, ErrorObjectOwned>;

    /// Stops the minting worker and waits for it to exit. Returns whether it
    /// is running.
    #[method(name = "stopminting")]
    async fn stop_minting(&self) -> Result<bool, ErrorObjectOwned>;

    #[method(name = "getmintinginfo")]
    async fn get_minting_info(&self) -> Result<MintingInfoJson, ErrorObjectOwned>;
}

pub struct RpcServerImpl {
    staker: Arc<Staker>,
    minter: Arc<Minter>,
    shutdown: CancellationToken,
}

impl RpcServerImpl {
    /// `shutdown` cancels diagnostic searches still running when the service stops.
    pub fn new(staker: Arc<Staker>, minter: Arc<Minter>, shutdown: CancellationToken) -> Self {
        Self { staker, minter, shutdown }
    }
}

#[async_trait]
impl MintingRpcServer for RpcServerImpl {
    async fn find_stake(
        &self,
        maxtime: Option<i64>,
        difficulty: Option<f64>,
    ) -> Result<Vec<FoundStake>, ErrorObjectOwned> {
        let max_time = maxtime.unwrap_or(0);
        let difficulty = difficulty.unwrap_or(0.0);
        if max_time < 0 {
            return Err(rpc_error(-8, "maxtime must not be negative"));
        }

        // Dropping the request (client gone) cancels the search.
        let cancel = self.shutdown.child_token();
        let guard = cancel.clone().drop_guard();
        let staker = self.staker.clone();
        debug!(max_time, difficulty, "findstake");
        let result =
            tokio::task::spawn_blocking(move || staker.find_stake(max_time, difficulty, &cancel))
                .await
                .map_err(|e| rpc_error(-1, &format!("search aborted: {e}")))?;
        guard.disarm();

        result.map_err(mint_error)
    }

    async fn start_minting(&self) -> Result<bool, ErrorObjectOwned> {
        if self.minter.start().await {
            info!("minting started over rpc");
        }
        Ok(self.minter.is_running())
    }

    async fn stop_minting(&self) -> Result<bool, ErrorObjectOwned> {
        if self.minter.stop().await {
            info!("minting stopped over rpc");
        }
        Ok(self.minter.is_running())
    }

    async fn get_minting_info(&self) -> Result<MintingInfoJson, ErrorObjectOwned> {
        let stats = self.minter.stats();
        Ok(MintingInfoJson {
            running: self.minter.is_running(),
            passes: stats.passes,
            kernels_found: stats.kernels_found,
            failed_passes: stats.failed_passes,
            last_kernel: stats.last_kernel.as_ref().map(KernelJson::from),
        })
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server.
pub async fn start_rpc_server(
    addr: &str,
    rpc_impl: RpcServerImpl,
) -> Result<ServerHandle, NodeError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| NodeError::Rpc(format!("RPC server error: {e}")))?;

    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}
