//! Stake kernel search.
//!
//! Two searches share the same pipeline (chain state, eligible outputs,
//! modifier resolution, kernel checks) and differ in timestamp policy:
//!
//! - [`Staker::create_coin_stake`] walks back from the anchor one second at a
//!   time for [`MINT_SEARCH_ATTEMPTS`] attempts per output and stops at the
//!   first kernel found anywhere.
//! - [`Staker::find_stake`] walks forward from now to a horizon and records
//!   every hit with the best difficulty at which it would still mint.
//!
//! Both poll the cancellation token before every output and every attempt.
//! A kernel check error aborts the search.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ppcmint_core::constants::{
    FIND_STAKE_DEFAULT_HORIZON, MAX_STAKE_SEARCH_INTERVAL, MIN_STAKE_CONFIRMATIONS,
    MINT_SEARCH_ATTEMPTS,
};
use ppcmint_core::difficulty::compact_to_difficulty;
use ppcmint_core::error::KernelError;
use ppcmint_core::traits::{ChainClient, StakeKernel, TxStore};
use ppcmint_core::types::{
    FoundStake, Hash256, KernelCheckResult, OutPoint, StakeKernelInput,
};

use crate::error::MintError;
use crate::modifier::ModifierCache;
use crate::report::{achievable_difficulty, search_bits};
use crate::selector::{find_eligible_outputs, stake_age_eligible};

/// A kernel found by the minting search, with the credit it earns.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct KernelFound {
    pub outpoint: OutPoint,
    /// Value of the staked output, to be credited to the coin-stake.
    pub credit: u64,
    pub tx_time: i64,
    pub hash: Hash256,
}

/// Runs stake searches against the wallet's outputs.
pub struct Staker {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TxStore>,
    kernel: Arc<dyn StakeKernel>,
    modifiers: ModifierCache,
    synced: AtomicBool,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl fmt::Debug for Staker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Staker")
            .field("modifiers", &self.modifiers)
            .field("synced", &self.chain_synced())
            .finish_non_exhaustive()
    }
}

impl Staker {
    /// Create a staker using the system clock. Starts unsynced.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn TxStore>,
        kernel: Arc<dyn StakeKernel>,
    ) -> Self {
        Self {
            modifiers: ModifierCache::new(chain.clone(), store.clone()),
            chain,
            store,
            kernel,
            synced: AtomicBool::new(false),
            clock: Box::new(|| Utc::now().timestamp()),
        }
    }

    /// Replace the clock that supplies "now" (Unix seconds).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn set_chain_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Release);
    }

    /// Whether the wallet has caught up with the chain server.
    pub fn chain_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Search the 60 seconds up to `from_time` for a stake kernel.
    ///
    /// Returns `Ok(None)` when nothing is found, when no output is old enough,
    /// on cancellation, or when the found credit is not covered by the
    /// confirmed balance.
    pub fn create_coin_stake(
        &self,
        from_time: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<KernelFound>, MintError> {
        let stamp = self.chain.block_stamp()?;
        let bits = self.chain.current_target()?;
        let params = self.chain.params()?;

        let eligibles = find_eligible_outputs(self.store.as_ref(), MIN_STAKE_CONFIRMATIONS, &stamp)?;
        if eligibles.is_empty() {
            return Ok(None);
        }

        let mut found = None;
        'outputs: for mut eligible in eligibles {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if !stake_age_eligible(
                eligible.block.time,
                params.stake_min_age,
                from_time,
                MAX_STAKE_SEARCH_INTERVAL,
            ) {
                continue;
            }
            let modifier = self.modifiers.ensure_modifier(&mut eligible.block)?;
            let base = StakeKernelInput::for_output(
                &eligible,
                modifier,
                params.stake_min_age,
                bits,
                from_time,
            );

            for n in 0..MINT_SEARCH_ATTEMPTS {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                let input = base.with_tx_time(from_time - n);
                let result = self.check(&input)?;
                if result.success {
                    info!(
                        outpoint = %eligible.outpoint,
                        tx_time = input.tx_time,
                        hash = %result.hash,
                        "valid kernel hash found"
                    );
                    found = Some(KernelFound {
                        outpoint: eligible.outpoint.clone(),
                        credit: eligible.amount,
                        tx_time: input.tx_time,
                        hash: result.hash,
                    });
                    break 'outputs;
                }
            }
        }

        let Some(kernel) = found else {
            return Ok(None);
        };

        let balance = self.store.balance(MIN_STAKE_CONFIRMATIONS, &stamp)?;
        if kernel.credit == 0 || kernel.credit > balance {
            warn!(credit = kernel.credit, balance, "kernel credit not covered by balance");
            return Ok(None);
        }
        debug!(credit = kernel.credit, balance, "credit available");
        Ok(Some(kernel))
    }

    /// Exhaustive diagnostic search from now through `max_time`.
    ///
    /// `max_time == 0` searches the next 30 days. A nonzero `difficulty`
    /// replaces the live network target. Returns every hit, chronological
    /// per output, outputs in store order. On cancellation the hits found so
    /// far are returned.
    pub fn find_stake(
        &self,
        max_time: i64,
        difficulty: f64,
        cancel: &CancellationToken,
    ) -> Result<Vec<FoundStake>, MintError> {
        let params = self.chain.params()?;
        let stamp = self.chain.block_stamp()?;
        let bits = search_bits(self.chain.current_target()?, difficulty)?;

        info!(
            difficulty = compact_to_difficulty(bits),
            bits = format_args!("{bits:#010x}"),
            "required difficulty"
        );

        let mut found = Vec::new();
        let eligibles = find_eligible_outputs(self.store.as_ref(), MIN_STAKE_CONFIRMATIONS, &stamp)?;
        if eligibles.is_empty() {
            return Ok(found);
        }

        let from_time = self.now();
        let max_time = if max_time == 0 {
            from_time + FIND_STAKE_DEFAULT_HORIZON
        } else {
            max_time
        };

        for mut eligible in eligibles {
            if cancel.is_cancelled() {
                return Ok(found);
            }
            if !stake_age_eligible(
                eligible.block.time,
                params.stake_min_age,
                from_time,
                MAX_STAKE_SEARCH_INTERVAL,
            ) {
                continue;
            }
            let modifier = self.modifiers.ensure_modifier(&mut eligible.block)?;

            let (class, addresses, _) = eligible.script.extract_addresses(params.network);
            let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
            info!(?addresses, %class, "addresses");
            info!(
                "CHECK {} PPCs from {} {}",
                eligible.amount as f64 / params.coin as f64,
                format_date(eligible.tx_time),
                eligible.outpoint
            );

            let mut input = StakeKernelInput::for_output(
                &eligible,
                modifier,
                params.stake_min_age,
                bits,
                from_time,
            );
            loop {
                if cancel.is_cancelled() {
                    return Ok(found);
                }
                let result = self.check(&input)?;
                if result.success {
                    let min_target = result.min_target.ok_or_else(|| {
                        KernelError::Malformed("successful kernel without minimum target".into())
                    })?;
                    let difficulty = achievable_difficulty(&min_target);
                    info!("MINT {} {}", format_time(input.tx_time), difficulty);
                    found.push(FoundStake {
                        difficulty,
                        time: input.tx_time,
                    });
                }
                if input.tx_time >= max_time {
                    break;
                }
                input = input.with_tx_time(input.tx_time + 1);
            }
        }

        Ok(found)
    }

    fn check(&self, input: &StakeKernelInput) -> Result<KernelCheckResult, MintError> {
        self.kernel.check_stake_kernel_hash(input).map_err(|e| {
            error!(tx_time = input.tx_time, "check kernel hash error: {e}");
            MintError::Kernel(e)
        })
    }
}

fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_time(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}
