//! Core protocol types: transactions, blocks, wallet block records, and the
//! value objects exchanged with the stake kernel.
//!
//! Amounts are in base units (1 PPC = 10^6 units). Times are Unix seconds.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::script::Script;

/// A 32-byte hash value.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}

/// Reference to a specific output of a previous transaction.
///
/// Ordered by `(txid, index)`; the wallet store iterates outputs in this order.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint, used for coinbase inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
)]
pub struct TxOutput {
    pub value: u64,
    pub script: Script,
}

impl TxOutput {
    /// Zero value with an empty script; the coin-stake marker output.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script.is_empty()
    }
}

/// A timestamped transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
)]
pub struct Transaction {
    pub version: u32,
    /// Transaction timestamp (Unix seconds). Part of the stake kernel.
    pub time: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// A coin-stake spends a real output and marks itself with an empty first output.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].previous_output.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }
}

/// Block header.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    /// Compact difficulty target.
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    const HASH_SIZE: usize = 4 * 4 + 2 * 32;

    /// Double SHA-256 over `version || prev_hash || merkle_root || timestamp || bits || nonce`,
    /// integers little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.bits.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        sha256d(&data)
    }
}

/// A block with its producer signature.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Signature over the header hash. Empty until signed.
    pub signature: Vec<u8>,
}

impl Block {
    /// Content hash that the block signature commits to.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// A proof-of-stake block carries a coin-stake as its second transaction.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }
}

/// Height and hash of the chain tip as seen by the wallet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStamp {
    pub height: u64,
    pub hash: Hash256,
}

/// Wallet-side record of a block that contains wallet transactions.
///
/// `kernel_stake_modifier` is `None` until resolved from the chain; once
/// resolved it never changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockRef {
    pub height: u64,
    pub hash: Hash256,
    /// Block timestamp (Unix seconds).
    pub time: i64,
    pub kernel_stake_modifier: Option<u64>,
}

/// A spendable wallet output offered to the stake search.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EligibleOutput {
    pub outpoint: OutPoint,
    pub amount: u64,
    /// Block that confirmed the output's transaction.
    pub block: BlockRef,
    /// Byte offset of the transaction within its block.
    pub tx_offset: u32,
    /// The transaction's own timestamp.
    pub tx_time: i64,
    pub script: Script,
}

/// Full parameter set for one kernel check.
///
/// Each attempt is an independent value; use [`with_tx_time`](Self::with_tx_time)
/// to derive the next candidate instead of mutating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakeKernelInput {
    pub block_from_time: i64,
    pub stake_modifier: u64,
    pub prev_tx_offset: u32,
    pub prev_tx_time: i64,
    pub prev_tx_out_index: u32,
    pub prev_tx_out_value: u64,
    pub protocol_v03: bool,
    pub stake_min_age: i64,
    /// Target per coin-day in compact form.
    pub bits: u32,
    /// Candidate coin-stake timestamp.
    pub tx_time: i64,
}

impl StakeKernelInput {
    /// Build the kernel input for an output whose block modifier is known.
    pub fn for_output(
        output: &EligibleOutput,
        stake_modifier: u64,
        stake_min_age: i64,
        bits: u32,
        tx_time: i64,
    ) -> Self {
        Self {
            block_from_time: output.block.time,
            stake_modifier,
            prev_tx_offset: output.tx_offset,
            prev_tx_time: output.tx_time,
            prev_tx_out_index: output.outpoint.index,
            prev_tx_out_value: output.amount,
            protocol_v03: true,
            stake_min_age,
            bits,
            tx_time,
        }
    }

    pub fn with_tx_time(self, tx_time: i64) -> Self {
        Self { tx_time, ..self }
    }
}

/// Outcome of one kernel check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelCheckResult {
    pub hash: Hash256,
    pub success: bool,
    /// Loosest per-coin-day target that would have met the hash. Set on success.
    pub min_target: Option<BigUint>,
}

/// One successful diagnostic search hit.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FoundStake {
    /// Best difficulty at which this timestamp still mints.
    pub difficulty: f64,
    pub time: i64,
}
