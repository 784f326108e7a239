//! Peercoin stake kernel implementing the [`StakeKernel`] trait.
//!
//! A kernel candidate is valid when its hash, read as a little-endian 256-bit
//! integer, does not exceed the per-coin-day target scaled by the spent
//! output's coin-day weight:
//!
//! ```text
//! hash(modifier, block_from_time, prev_tx_offset, prev_tx_time, prev_index, tx_time)
//!     <= target(bits) * value * time_weight / COIN / 86400
//! ```
//!
//! `time_weight` is the output's age capped at the maximum stake age, minus
//! the minimum stake age (the v0.3 rule).

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};
use tracing::trace;

use ppcmint_core::constants::{COIN, SECONDS_PER_DAY, STAKE_MAX_AGE};
use ppcmint_core::difficulty::compact_to_target;
use ppcmint_core::error::KernelError;
use ppcmint_core::traits::StakeKernel;
use ppcmint_core::types::{Hash256, KernelCheckResult, StakeKernelInput};

/// Serialized kernel length: one u64 and five u32 fields.
const KERNEL_DATA_LEN: usize = 8 + 5 * 4;

/// The stake-math oracle.
#[derive(Clone)]
pub struct PeercoinKernel {
    stake_max_age: i64,
}

impl fmt::Debug for PeercoinKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeercoinKernel")
            .field("stake_max_age", &self.stake_max_age)
            .finish()
    }
}

impl Default for PeercoinKernel {
    fn default() -> Self {
        Self::new(STAKE_MAX_AGE)
    }
}

impl PeercoinKernel {
    pub fn new(stake_max_age: i64) -> Self {
        Self { stake_max_age }
    }

    /// Coin-day weight of the spent output at `input.tx_time`. Zero for
    /// outputs that are not older than the minimum stake age.
    pub fn coin_day_weight(&self, input: &StakeKernelInput) -> u128 {
        let age = (input.tx_time - input.prev_tx_time).min(self.stake_max_age);
        let age = if input.protocol_v03 {
            age - input.stake_min_age
        } else {
            age
        };
        let time_weight = age.max(0) as u128;
        u128::from(input.prev_tx_out_value) * time_weight
            / u128::from(COIN)
            / SECONDS_PER_DAY as u128
    }

    /// Double SHA-256 over the little-endian kernel fields.
    pub fn kernel_hash(input: &StakeKernelInput) -> Result<Hash256, KernelError> {
        let mut data = Vec::with_capacity(KERNEL_DATA_LEN);
        data.extend_from_slice(&input.stake_modifier.to_le_bytes());
        data.extend_from_slice(&time_field("block_from_time", input.block_from_time)?.to_le_bytes());
        data.extend_from_slice(&input.prev_tx_offset.to_le_bytes());
        data.extend_from_slice(&time_field("prev_tx_time", input.prev_tx_time)?.to_le_bytes());
        data.extend_from_slice(&input.prev_tx_out_index.to_le_bytes());
        data.extend_from_slice(&time_field("tx_time", input.tx_time)?.to_le_bytes());

        let first = Sha256::digest(&data);
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        Ok(Hash256(out))
    }
}

fn time_field(name: &str, value: i64) -> Result<u32, KernelError> {
    u32::try_from(value)
        .map_err(|_| KernelError::Malformed(format!("{name} {value} does not fit in 32 bits")))
}

impl StakeKernel for PeercoinKernel {
    fn check_stake_kernel_hash(&self, input: &StakeKernelInput) -> Result<KernelCheckResult, KernelError> {
        if input.tx_time < input.prev_tx_time {
            return Err(KernelError::TimeViolation {
                tx_time: input.tx_time,
                prev_tx_time: input.prev_tx_time,
            });
        }
        if input.block_from_time + input.stake_min_age > input.tx_time {
            return Err(KernelError::MinAgeViolation {
                block_from_time: input.block_from_time,
                stake_min_age: input.stake_min_age,
                tx_time: input.tx_time,
            });
        }

        let hash = Self::kernel_hash(input)?;
        let weight = BigUint::from(self.coin_day_weight(input));
        if weight.is_zero() {
            return Ok(KernelCheckResult {
                hash,
                success: false,
                min_target: None,
            });
        }

        let hash_value = BigUint::from_bytes_le(hash.as_bytes());
        let threshold = compact_to_target(input.bits) * &weight;
        if hash_value > threshold {
            return Ok(KernelCheckResult {
                hash,
                success: false,
                min_target: None,
            });
        }

        // Smallest per-coin-day target that still admits this hash.
        let min_target = (&hash_value + &weight - 1u32) / &weight;
        trace!(%hash, tx_time = input.tx_time, "kernel meets target");
        Ok(KernelCheckResult {
            hash,
            success: true,
            min_target: Some(min_target),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Target of 2^255: every hash passes once the weight reaches 2.
    const EASIEST_BITS: u32 = 0x2100_8000;
    const HARDEST_BITS: u32 = 0x0300_0001;
    const MIN_AGE: i64 = 30 * SECONDS_PER_DAY;

    fn input(tx_time: i64, bits: u32) -> StakeKernelInput {
        StakeKernelInput {
            block_from_time: 1_000_000,
            stake_modifier: 0x0123_4567_89ab_cdef,
            prev_tx_offset: 81,
            prev_tx_time: 1_000_000,
            prev_tx_out_index: 1,
            prev_tx_out_value: 1_000 * COIN,
            protocol_v03: true,
            stake_min_age: MIN_AGE,
            bits,
            tx_time,
        }
    }

    fn aged(days: i64) -> i64 {
        1_000_000 + days * SECONDS_PER_DAY
    }

    #[test]
    fn tx_time_before_prev_rejected() {
        let mut i = input(999_999, EASIEST_BITS);
        i.stake_min_age = 0;
        i.block_from_time = 0;
        assert!(matches!(
            PeercoinKernel::default().check_stake_kernel_hash(&i),
            Err(KernelError::TimeViolation { .. })
        ));
    }

    #[test]
    fn min_age_rejected() {
        let i = input(aged(29), EASIEST_BITS);
        assert!(matches!(
            PeercoinKernel::default().check_stake_kernel_hash(&i),
            Err(KernelError::MinAgeViolation { .. })
        ));
    }

    #[test]
    fn zero_weight_never_succeeds() {
        let i = input(aged(30), EASIEST_BITS);
        let kernel = PeercoinKernel::default();
        assert_eq!(kernel.coin_day_weight(&i), 0);
        let result = kernel.check_stake_kernel_hash(&i).unwrap();
        assert!(!result.success);
        assert!(result.min_target.is_none());
    }

    #[test]
    fn weight_is_capped_at_max_age() {
        let kernel = PeercoinKernel::default();
        let at_cap = kernel.coin_day_weight(&input(aged(90), EASIEST_BITS));
        let beyond = kernel.coin_day_weight(&input(aged(200), EASIEST_BITS));
        assert_eq!(at_cap, beyond);
        // 1000 coins for 60 weighted days.
        assert_eq!(at_cap, 60_000);
    }

    #[test]
    fn easiest_target_succeeds_with_tight_minimum() {
        let i = input(aged(45), EASIEST_BITS);
        let kernel = PeercoinKernel::default();
        let result = kernel.check_stake_kernel_hash(&i).unwrap();
        assert!(result.success);

        let weight = BigUint::from(kernel.coin_day_weight(&i));
        let hash = BigUint::from_bytes_le(result.hash.as_bytes());
        let min = result.min_target.unwrap();
        assert!(&min * &weight >= hash);
        assert!((&min - 1u32) * &weight < hash);
    }

    #[test]
    fn hardest_target_fails() {
        let result = PeercoinKernel::default()
            .check_stake_kernel_hash(&input(aged(45), HARDEST_BITS))
            .unwrap();
        assert!(!result.success);
    }

    #[test]
    fn kernel_hash_field_layout() {
        let i = input(aged(45), EASIEST_BITS);
        let mut data = Vec::new();
        data.extend_from_slice(&0x0123_4567_89ab_cdefu64.to_le_bytes());
        data.extend_from_slice(&1_000_000u32.to_le_bytes());
        data.extend_from_slice(&81u32.to_le_bytes());
        data.extend_from_slice(&1_000_000u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(aged(45) as u32).to_le_bytes());
        let expected = Sha256::digest(Sha256::digest(&data));
        assert_eq!(PeercoinKernel::kernel_hash(&i).unwrap().as_bytes()[..], expected[..]);
    }

    #[test]
    fn hash_depends_on_timestamp() {
        let a = PeercoinKernel::kernel_hash(&input(aged(45), EASIEST_BITS)).unwrap();
        let b = PeercoinKernel::kernel_hash(&input(aged(45) + 1, EASIEST_BITS)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_time_is_malformed() {
        let mut i = input(i64::from(u32::MAX) + 10, EASIEST_BITS);
        i.stake_min_age = 0;
        assert!(matches!(
            PeercoinKernel::default().check_stake_kernel_hash(&i),
            Err(KernelError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn min_target_admits_hash(modifier: u64, offset in 0i64..(60 * SECONDS_PER_DAY)) {
            let mut i = input(aged(31) + offset, EASIEST_BITS);
            i.stake_modifier = modifier;
            let kernel = PeercoinKernel::default();
            let result = kernel.check_stake_kernel_hash(&i).unwrap();
            if let Some(min) = result.min_target {
                let weight = BigUint::from(kernel.coin_day_weight(&i));
                let hash = BigUint::from_bytes_le(result.hash.as_bytes());
                prop_assert!(min * weight >= hash);
            }
        }

        #[test]
        fn success_is_deterministic(modifier: u64, offset in 0i64..(60 * SECONDS_PER_DAY)) {
            let mut i = input(aged(31) + offset, 0x1e00_ffff);
            i.stake_modifier = modifier;
            let kernel = PeercoinKernel::default();
            prop_assert_eq!(
                kernel.check_stake_kernel_hash(&i).unwrap(),
                kernel.check_stake_kernel_hash(&i).unwrap()
            );
        }
    }
}
