//! Error types for the ppcmint protocol layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain client disconnected")] Disconnected,
    #[error("chain rpc: {0}")] Rpc(String),
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("malformed chain response: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown block: {0}")] UnknownBlock(String),
    #[error("I/O error: {0}")] Io(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("corrupted snapshot: {0}")] Corrupted(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("nTime violation: tx time {tx_time} before prev tx time {prev_tx_time}")] TimeViolation { tx_time: i64, prev_tx_time: i64 },
    #[error("min age violation: block time {block_from_time} + min age {stake_min_age} > tx time {tx_time}")] MinAgeViolation { block_from_time: i64, stake_min_age: i64, tx_time: i64 },
    #[error("malformed kernel input: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DifficultyError {
    #[error("invalid difficulty: {0}")] InvalidDifficulty(f64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58: {0}")] InvalidBase58(String),
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("unknown version byte: {0}")] UnknownVersion(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("no key for address {0}")] UnknownAddress(String),
    #[error("keystore is locked")] Locked,
    #[error("keystore is not locked")] NotLocked,
    #[error("invalid passphrase")] InvalidPassphrase,
    #[error("encryption: {0}")] Encryption(String),
}
