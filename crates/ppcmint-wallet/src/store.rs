//! In-memory wallet transaction store with dirty tracking.
//!
//! Outputs are kept in a `BTreeMap` keyed by [`OutPoint`], so every query
//! yields them in ascending outpoint order. Mutations (including cached
//! stake modifiers) only reach disk when the owner flushes a dirty store.
//!
//! # Snapshot format
//! ```text
//! { "magic": "PPCW", "version": 1, "blocks": [...], "outputs": [...] }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ppcmint_core::error::StoreError;
use ppcmint_core::script::Script;
use ppcmint_core::traits::TxStore;
use ppcmint_core::types::{BlockRef, BlockStamp, EligibleOutput, Hash256, OutPoint};

/// Magic string identifying a store snapshot.
pub const STORE_MAGIC: &str = "PPCW";

/// Current snapshot format version.
pub const STORE_VERSION: u32 = 1;

/// A wallet-owned output as recorded in the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredOutput {
    pub outpoint: OutPoint,
    pub amount: u64,
    /// Hash of the block that confirmed the output's transaction.
    pub block_hash: Hash256,
    pub tx_offset: u32,
    pub tx_time: i64,
    pub script: Script,
    pub spent: bool,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    magic: String,
    version: u32,
    blocks: Vec<BlockRef>,
    outputs: Vec<StoredOutput>,
}

#[derive(Default)]
struct StoreData {
    blocks: BTreeMap<Hash256, BlockRef>,
    outputs: BTreeMap<OutPoint, StoredOutput>,
}

#[derive(Default)]
pub struct MemoryTxStore {
    data: RwLock<StoreData>,
    dirty: AtomicBool,
}

/// Confirmations of a block at `height` when the tip is `stamp`.
pub fn confirmations(height: u64, stamp: &BlockStamp) -> u64 {
    if stamp.height >= height {
        stamp.height - height + 1
    } else {
        0
    }
}

impl MemoryTxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block that confirms wallet transactions.
    pub fn insert_block(&self, block: BlockRef) {
        self.data.write().blocks.insert(block.hash, block);
        self.mark_dirty();
    }

    /// Record a wallet output. Its block must already be known.
    pub fn insert_output(&self, output: StoredOutput) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if !data.blocks.contains_key(&output.block_hash) {
            return Err(StoreError::UnknownBlock(output.block_hash.to_string()));
        }
        data.outputs.insert(output.outpoint.clone(), output);
        drop(data);
        self.mark_dirty();
        Ok(())
    }

    /// Mark an output spent. Returns `false` for unknown or already spent outputs.
    pub fn mark_spent(&self, outpoint: &OutPoint) -> bool {
        let changed = match self.data.write().outputs.get_mut(outpoint) {
            Some(output) if !output.spent => {
                output.spent = true;
                true
            }
            _ => false,
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn output_count(&self) -> usize {
        self.data.read().outputs.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write a JSON snapshot via a temporary file and rename.
    pub fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = {
            let data = self.data.read();
            Snapshot {
                magic: STORE_MAGIC.to_string(),
                version: STORE_VERSION,
                blocks: data.blocks.values().cloned().collect(),
                outputs: data.outputs.values().cloned().collect(),
            }
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Load a snapshot written by [`save_to_file`](Self::save_to_file).
    /// The loaded store starts clean.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::Io(e.to_string()))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupted(format!("invalid snapshot: {e}")))?;

        if snapshot.magic != STORE_MAGIC {
            return Err(StoreError::Corrupted("invalid magic".into()));
        }
        if snapshot.version != STORE_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported version: {}",
                snapshot.version
            )));
        }

        let mut data = StoreData::default();
        for block in snapshot.blocks {
            data.blocks.insert(block.hash, block);
        }
        for output in snapshot.outputs {
            if !data.blocks.contains_key(&output.block_hash) {
                return Err(StoreError::Corrupted(format!(
                    "output {} references unknown block {}",
                    output.outpoint, output.block_hash
                )));
            }
            data.outputs.insert(output.outpoint.clone(), output);
        }

        Ok(Self {
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
        })
    }

    /// Save if dirty, then clear the flag. Returns whether a write happened.
    pub fn flush_if_dirty(&self, path: &Path) -> Result<bool, StoreError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        if let Err(e) = self.save_to_file(path) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        debug!(path = %path.display(), "wallet store flushed");
        Ok(true)
    }
}

impl TxStore for MemoryTxStore {
    fn eligible_outputs(
        &self,
        min_confirmations: u64,
        stamp: &BlockStamp,
    ) -> Result<Vec<EligibleOutput>, StoreError> {
        let data = self.data.read();
        let mut eligible = Vec::new();
        for output in data.outputs.values().filter(|o| !o.spent) {
            let block = data
                .blocks
                .get(&output.block_hash)
                .ok_or_else(|| StoreError::UnknownBlock(output.block_hash.to_string()))?;
            if confirmations(block.height, stamp) < min_confirmations {
                continue;
            }
            eligible.push(EligibleOutput {
                outpoint: output.outpoint.clone(),
                amount: output.amount,
                block: block.clone(),
                tx_offset: output.tx_offset,
                tx_time: output.tx_time,
                script: output.script.clone(),
            });
        }
        Ok(eligible)
    }

    fn set_kernel_stake_modifier(&self, block_hash: &Hash256, modifier: u64) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let block = data
            .blocks
            .get_mut(block_hash)
            .ok_or_else(|| StoreError::UnknownBlock(block_hash.to_string()))?;
        block.kernel_stake_modifier = Some(modifier);
        Ok(())
    }

    fn block(&self, block_hash: &Hash256) -> Result<Option<BlockRef>, StoreError> {
        Ok(self.data.read().blocks.get(block_hash).cloned())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn balance(&self, min_confirmations: u64, stamp: &BlockStamp) -> Result<u64, StoreError> {
        Ok(self
            .eligible_outputs(min_confirmations, stamp)?
            .iter()
            .map(|o| o.amount)
            .sum())
    }
}

impl fmt::Debug for MemoryTxStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("MemoryTxStore")
            .field("blocks", &data.blocks.len())
            .field("outputs", &data.outputs.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64) -> BlockRef {
        BlockRef {
            height,
            hash: Hash256([height as u8; 32]),
            time: 1_000 + height as i64 * 600,
            kernel_stake_modifier: None,
        }
    }

    fn output(tag: u8, index: u32, height: u64, amount: u64) -> StoredOutput {
        StoredOutput {
            outpoint: OutPoint { txid: Hash256([tag; 32]), index },
            amount,
            block_hash: Hash256([height as u8; 32]),
            tx_offset: 81,
            tx_time: 1_000,
            script: Script::PayToPubKey([tag; 32]),
            spent: false,
        }
    }

    fn populated() -> MemoryTxStore {
        let store = MemoryTxStore::new();
        for h in [10, 15, 20] {
            store.insert_block(block(h));
        }
        store.insert_output(output(3, 0, 10, 300)).unwrap();
        store.insert_output(output(1, 1, 15, 100)).unwrap();
        store.insert_output(output(2, 0, 20, 200)).unwrap();
        store
    }

    fn stamp(height: u64) -> BlockStamp {
        BlockStamp { height, hash: Hash256::ZERO }
    }

    #[test]
    fn confirmation_counting() {
        assert_eq!(confirmations(10, &stamp(10)), 1);
        assert_eq!(confirmations(10, &stamp(15)), 6);
        assert_eq!(confirmations(11, &stamp(10)), 0);
    }

    #[test]
    fn eligible_outputs_filter_by_confirmations() {
        let store = populated();
        let at_20 = store.eligible_outputs(6, &stamp(20)).unwrap();
        let heights: Vec<u64> = at_20.iter().map(|o| o.block.height).collect();
        assert_eq!(heights, vec![15, 10]);
    }

    #[test]
    fn eligible_outputs_are_in_outpoint_order() {
        let store = populated();
        let all = store.eligible_outputs(1, &stamp(100)).unwrap();
        let tags: Vec<u8> = all.iter().map(|o| o.outpoint.txid.0[0]).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn spent_outputs_excluded() {
        let store = populated();
        let op = OutPoint { txid: Hash256([1; 32]), index: 1 };
        assert!(store.mark_spent(&op));
        assert!(!store.mark_spent(&op));
        assert_eq!(store.eligible_outputs(1, &stamp(100)).unwrap().len(), 2);
        assert_eq!(store.balance(1, &stamp(100)).unwrap(), 500);
    }

    #[test]
    fn output_for_unknown_block_rejected() {
        let store = MemoryTxStore::new();
        assert!(matches!(
            store.insert_output(output(1, 0, 99, 1)),
            Err(StoreError::UnknownBlock(_))
        ));
    }

    #[test]
    fn balance_respects_confirmations() {
        let store = populated();
        assert_eq!(store.balance(6, &stamp(20)).unwrap(), 400);
        assert_eq!(store.balance(6, &stamp(9)).unwrap(), 0);
    }

    #[test]
    fn modifier_write_reaches_records() {
        let store = populated();
        let hash = Hash256([10; 32]);
        store.set_kernel_stake_modifier(&hash, 77).unwrap();
        assert_eq!(store.block(&hash).unwrap().unwrap().kernel_stake_modifier, Some(77));
        let outputs = store.eligible_outputs(1, &stamp(100)).unwrap();
        let from_10 = outputs.iter().find(|o| o.block.height == 10).unwrap();
        assert_eq!(from_10.block.kernel_stake_modifier, Some(77));
        assert!(store.set_kernel_stake_modifier(&Hash256([0xEE; 32]), 1).is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let store = populated();
        store.set_kernel_stake_modifier(&Hash256([15; 32]), 42).unwrap();
        store.save_to_file(&path).unwrap();

        let loaded = MemoryTxStore::load_from_file(&path).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.output_count(), 3);
        assert_eq!(
            loaded.block(&Hash256([15; 32])).unwrap().unwrap().kernel_stake_modifier,
            Some(42)
        );
        assert_eq!(
            loaded.eligible_outputs(1, &stamp(100)).unwrap(),
            store.eligible_outputs(1, &stamp(100)).unwrap()
        );
    }

    #[test]
    fn flush_only_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let store = populated();
        assert!(store.is_dirty());

        assert!(store.flush_if_dirty(&path).unwrap());
        assert!(!store.is_dirty());
        assert!(!store.flush_if_dirty(&path).unwrap());

        store.mark_dirty();
        store.mark_dirty();
        assert!(store.flush_if_dirty(&path).unwrap());
    }

    #[test]
    fn failed_flush_stays_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = populated();
        assert!(store.flush_if_dirty(&blocker.join("wallet.json")).is_err());
        assert!(store.is_dirty());
    }

    #[test]
    fn load_corrupted_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            MemoryTxStore::load_from_file(&path),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn load_wrong_magic_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, br#"{"magic":"XXXX","version":1,"blocks":[],"outputs":[]}"#).unwrap();
        assert_eq!(
            MemoryTxStore::load_from_file(&path).unwrap_err(),
            StoreError::Corrupted("invalid magic".into())
        );
    }

    #[test]
    fn load_nonexistent_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MemoryTxStore::load_from_file(&dir.path().join("missing.json")),
            Err(StoreError::Io(_))
        ));
    }
}
