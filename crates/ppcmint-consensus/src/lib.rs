//! # ppcmint-consensus: proof-of-stake kernel evaluation.
//!
//! This crate implements the [`StakeKernel`](ppcmint_core::traits::StakeKernel)
//! trait: the Peercoin kernel hash, the coin-day weighted target check, and
//! the minimum qualifying target reported back to the minter.

pub mod kernel;

pub use kernel::PeercoinKernel;
