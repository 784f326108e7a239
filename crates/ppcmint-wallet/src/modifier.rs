//! Kernel stake modifier resolution with a process-wide cache.
//!
//! A block's modifier is resolved from the chain at most once, even when
//! several searches ask for it concurrently: chain lookups are serialized and
//! the cache is checked again once a caller holds the lookup lock. Success is
//! written to the cache and the store record, and the store is flagged dirty
//! while the cache write lock is held. Failures are not cached, so the next
//! search pass retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use ppcmint_core::traits::{ChainClient, TxStore};
use ppcmint_core::types::{BlockRef, Hash256};

use crate::error::MintError;

pub struct ModifierCache {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TxStore>,
    resolved: RwLock<HashMap<Hash256, u64>>,
    /// Held across a chain lookup.
    resolving: Mutex<()>,
}

impl fmt::Debug for ModifierCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierCache")
            .field("resolved", &self.resolved.read().len())
            .finish_non_exhaustive()
    }
}

impl ModifierCache {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<dyn TxStore>) -> Self {
        Self {
            chain,
            store,
            resolved: RwLock::new(HashMap::new()),
            resolving: Mutex::new(()),
        }
    }

    /// The block's modifier, resolving it from the chain on first use.
    ///
    /// Updates `block` in place once resolved.
    pub fn ensure_modifier(&self, block: &mut BlockRef) -> Result<u64, MintError> {
        if let Some(modifier) = block.kernel_stake_modifier {
            return Ok(modifier);
        }
        if let Some(modifier) = self.cached(&block.hash) {
            block.kernel_stake_modifier = Some(modifier);
            return Ok(modifier);
        }

        let _resolving = self.resolving.lock();
        if let Some(modifier) = self.cached(&block.hash) {
            block.kernel_stake_modifier = Some(modifier);
            return Ok(modifier);
        }

        let modifier = match self.chain.kernel_stake_modifier(&block.hash) {
            Ok(m) => m,
            Err(e) => {
                error!(block = %block.hash, height = block.height, "cannot get kernel stake modifier: {e}");
                return Err(e.into());
            }
        };

        let mut resolved = self.resolved.write();
        self.store.set_kernel_stake_modifier(&block.hash, modifier)?;
        resolved.insert(block.hash, modifier);
        self.store.mark_dirty();
        drop(resolved);

        block.kernel_stake_modifier = Some(modifier);
        info!(
            block = %block.hash,
            height = block.height,
            modifier = format_args!("{modifier:#018x}"),
            "kernel stake modifier resolved"
        );
        Ok(modifier)
    }

    /// A previously resolved modifier, without touching the chain.
    pub fn cached(&self, block_hash: &Hash256) -> Option<u64> {
        self.resolved.read().get(block_hash).copied()
    }

    pub fn len(&self) -> usize {
        self.resolved.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
