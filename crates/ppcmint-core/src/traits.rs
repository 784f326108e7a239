//! Collaborator interfaces consumed by the minting engine.
//!
//! - [`ChainClient`]: chain tip, current target, parameters, stake modifiers
//! - [`TxStore`]: the wallet's output and block records with dirty tracking
//! - [`Keystore`] / [`KeyInfo`]: address to signing key lookup
//! - [`StakeKernel`]: the stake-math oracle (ppcmint-consensus implements)
//!
//! All collaborators are synchronous. The minter runs searches on a blocking
//! thread, so an implementation may block on network I/O.

use crate::address::Address;
use crate::constants::NetParams;
use crate::crypto::KeyPair;
use crate::error::{ChainError, KernelError, KeystoreError, StoreError};
use crate::types::{BlockRef, BlockStamp, EligibleOutput, Hash256, KernelCheckResult, StakeKernelInput};

/// Connection to a chain server.
pub trait ChainClient: Send + Sync {
    /// Height and hash of the current best block.
    fn block_stamp(&self) -> Result<BlockStamp, ChainError>;

    /// Current proof-of-stake target in compact form.
    ///
    /// Fails with [`ChainError::Disconnected`] once the client is shutting down.
    fn current_target(&self) -> Result<u32, ChainError>;

    /// Network parameters the client was configured with.
    fn params(&self) -> Result<NetParams, ChainError>;

    /// Kernel stake modifier of the block with the given hash.
    fn kernel_stake_modifier(&self, block_hash: &Hash256) -> Result<u64, ChainError>;
}

/// The wallet's persistent transaction store.
pub trait TxStore: Send + Sync {
    /// Unspent wallet outputs with at least `min_confirmations` confirmations
    /// relative to `stamp`. Iteration order is stable between calls.
    fn eligible_outputs(
        &self,
        min_confirmations: u64,
        stamp: &BlockStamp,
    ) -> Result<Vec<EligibleOutput>, StoreError>;

    /// Record a resolved modifier on the stored block. Does not mark the store dirty.
    fn set_kernel_stake_modifier(&self, block_hash: &Hash256, modifier: u64) -> Result<(), StoreError>;

    /// Look up a stored block record.
    fn block(&self, block_hash: &Hash256) -> Result<Option<BlockRef>, StoreError>;

    /// Flag the store for a later flush. Idempotent.
    fn mark_dirty(&self);

    /// Sum of unspent outputs with at least `min_confirmations` confirmations.
    fn balance(&self, min_confirmations: u64, stamp: &BlockStamp) -> Result<u64, StoreError>;
}

/// Key material for one wallet address.
pub trait KeyInfo {
    fn address(&self) -> &Address;

    /// The signing key. Fails while the key is encrypted.
    fn private_key(&self) -> Result<KeyPair, KeystoreError>;
}

/// Address-indexed key lookup.
pub trait Keystore: Send + Sync {
    fn lookup(&self, address: &Address) -> Result<Box<dyn KeyInfo + '_>, KeystoreError>;
}

/// Stake-math oracle. Deterministic and side-effect free.
pub trait StakeKernel: Send + Sync {
    /// Evaluate one kernel candidate.
    ///
    /// An `Err` means the input itself is invalid (time or age violation),
    /// not that the kernel missed the target.
    fn check_stake_kernel_hash(&self, input: &StakeKernelInput) -> Result<KernelCheckResult, KernelError>;
}
