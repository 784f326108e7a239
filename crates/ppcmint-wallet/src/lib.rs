//! # ppcmint-wallet: proof-of-stake minting engine.
//!
//! Finds spendable outputs old enough to stake, resolves their kernel stake
//! modifiers, searches time windows for a kernel hash that meets the target,
//! and signs blocks with the key that owns the reward output. The search runs
//! in two modes: minting (one short window ending now) and diagnostic (every
//! second up to a horizon, against an optional difficulty override).
//!
//! # Modules
//!
//! - [`error`]: `MintError` enum
//! - [`selector`]: eligible output selection and the stake-age gate
//! - [`modifier`]: kernel stake modifier cache
//! - [`report`]: difficulty reporting for found kernels
//! - [`stake`]: the `Staker` search engine
//! - [`minter`]: background worker lifecycle
//! - [`signer`]: block signing and verification
//! - [`store`]: in-memory transaction store with file snapshots
//! - [`keystore`]: imported keys with passphrase locking

pub mod error;
pub mod keystore;
pub mod minter;
pub mod modifier;
pub mod report;
pub mod selector;
pub mod signer;
pub mod stake;
pub mod store;

// Re-exports for convenient access
pub use error::MintError;
pub use keystore::KeyStore;
pub use minter::{CoinStaker, Minter, MinterState, MintingStats, MintingStatsSnapshot};
pub use modifier::ModifierCache;
pub use report::{achievable_difficulty, search_bits};
pub use selector::{find_eligible_outputs, stake_age_eligible};
pub use signer::{sign_block, verify_block_signature};
pub use stake::{KernelFound, Staker};
pub use store::MemoryTxStore;
