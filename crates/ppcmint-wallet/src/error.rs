//! Minting error types.

use ppcmint_core::error::{
    AddressError, ChainError, CryptoError, DifficultyError, KernelError, KeystoreError, StoreError,
};
use ppcmint_core::script::ScriptClass;
use thiserror::Error;

/// Errors raised by the minting engine and its wallet collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MintError {
    /// Chain server unavailable or returned an error.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Wallet store lookup or persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stake oracle rejected a kernel input. Aborts the search.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Operator-supplied difficulty could not be converted to a target.
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Address(#[from] AddressError),

    /// The reward output is not a single-key pay-to-pubkey script.
    #[error("unsupported transaction type: {0}")]
    UnsupportedTransaction(ScriptClass),

    /// The block has no transaction/output at the reward position.
    #[error("block has no reward output at tx {tx_index} output {out_index}")]
    MissingRewardOutput {
        tx_index: usize,
        out_index: usize,
    },

    /// The reward script yielded no address.
    #[error("reward output has no address")]
    NoAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_transaction() {
        let e = MintError::UnsupportedTransaction(ScriptClass::MultiSig);
        assert_eq!(e.to_string(), "unsupported transaction type: multisig");
    }

    #[test]
    fn display_missing_reward_output() {
        let e = MintError::MissingRewardOutput { tx_index: 1, out_index: 1 };
        assert_eq!(e.to_string(), "block has no reward output at tx 1 output 1");
    }

    #[test]
    fn chain_error_is_transparent() {
        let e: MintError = ChainError::Disconnected.into();
        assert_eq!(e.to_string(), "chain client disconnected");
        assert_eq!(e, MintError::Chain(ChainError::Disconnected));
    }

    #[test]
    fn from_keystore_error() {
        let e: MintError = KeystoreError::Locked.into();
        assert_eq!(e, MintError::Keystore(KeystoreError::Locked));
    }

    #[test]
    fn clone_and_eq() {
        let e1 = MintError::Difficulty(DifficultyError::InvalidDifficulty(-1.0));
        assert_eq!(e1.clone(), e1);
    }
}
