//! Compact target codec and difficulty conversions.
//!
//! # Compact form
//!
//! A compact target packs an arbitrary-precision target into 32 bits:
//! the top byte is a base-256 exponent (the target's length in bytes) and
//! the low 23 bits are the mantissa. Bit 23 is a sign flag; targets are never
//! negative, so a set sign flag decodes to zero.
//!
//! Encoding truncates to the three most significant bytes, so
//! `target -> compact -> target` rounds down. `compact -> target -> compact`
//! is the identity for every normalized compact value.
//!
//! # Difficulty
//!
//! Difficulty is the proof-of-work limit ([`POW_LIMIT_BITS`]) divided by the
//! target, reported as an `f64`. Difficulty 1 is the limit itself.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::constants::POW_LIMIT_BITS;
use crate::error::DifficultyError;

const MANTISSA_MASK: u32 = 0x007f_ffff;
const SIGN_BIT: u32 = 0x0080_0000;

/// Largest target representable by a 256-bit hash comparison.
const MAX_TARGET_BITS: u64 = 256;

/// Decode a compact value into its full target.
pub fn compact_to_target(bits: u32) -> BigUint {
    let exponent = bits >> 24;
    let mantissa = bits & MANTISSA_MASK;
    if bits & SIGN_BIT != 0 && mantissa != 0 {
        return BigUint::zero();
    }
    if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3) as usize)
    }
}

/// Encode a target in compact form, truncating to three significant bytes.
pub fn target_to_compact(target: &BigUint) -> u32 {
    let mut size = target.bits().div_ceil(8) as u32;
    let mut mantissa = if size <= 3 {
        let low = target.to_u32().unwrap_or(0);
        low << (8 * (3 - size))
    } else {
        let shifted: BigUint = target >> (8 * (size - 3) as usize);
        shifted.to_u32().unwrap_or(0)
    };
    // Keep the sign bit clear by moving one byte into the exponent.
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }
    mantissa | (size << 24)
}

/// The next representable compact value above `bits`.
///
/// Adds one unit in the last place of the mantissa, renormalizing when the
/// mantissa overflows into the sign bit.
pub fn increment_compact(bits: u32) -> u32 {
    let sign = bits & SIGN_BIT;
    let mut mantissa = bits & MANTISSA_MASK;
    let mut exponent = bits >> 24;
    if exponent <= 3 {
        mantissa += 1 << (8 * (3 - exponent));
    } else {
        mantissa += 1;
    }
    if mantissa >= SIGN_BIT {
        mantissa >>= 8;
        exponent += 1;
    }
    (exponent << 24) | sign | mantissa
}

/// Human-facing difficulty of a compact target.
///
/// Divides `0xffff` by the mantissa and scales by 256 per exponent step
/// until the exponent reaches 29 (the exponent of [`POW_LIMIT_BITS`]).
/// A zero mantissa reports difficulty 0.
pub fn compact_to_difficulty(bits: u32) -> f64 {
    let mantissa = bits & 0x00ff_ffff;
    if mantissa == 0 {
        return 0.0;
    }
    let mut shift = (bits >> 24) & 0xff;
    let mut diff = f64::from(0x0000_ffff_u32) / f64::from(mantissa);
    while shift < 29 {
        diff *= 256.0;
        shift += 1;
    }
    while shift > 29 {
        diff /= 256.0;
        shift -= 1;
    }
    diff
}

/// Target for a given difficulty: `pow_limit / difficulty`, rounded down.
///
/// The division is exact: the `f64` is decomposed into `m * 2^e` and the
/// limit is divided by that rational value in big-integer arithmetic.
/// Rejects zero, negative, non-finite, and difficulties so low that the
/// target would not fit in 256 bits.
pub fn difficulty_to_target(difficulty: f64) -> Result<BigUint, DifficultyError> {
    if !difficulty.is_finite() || difficulty <= 0.0 {
        return Err(DifficultyError::InvalidDifficulty(difficulty));
    }

    let (mantissa, exponent) = decompose(difficulty);
    let limit = compact_to_target(POW_LIMIT_BITS);
    let target = if exponent >= 0 {
        limit / (BigUint::from(mantissa) << exponent as usize)
    } else {
        (limit << exponent.unsigned_abs() as usize) / BigUint::from(mantissa)
    };

    if target.bits() > MAX_TARGET_BITS {
        return Err(DifficultyError::InvalidDifficulty(difficulty));
    }
    Ok(target)
}

/// Compact target for a given difficulty.
pub fn difficulty_to_compact(difficulty: f64) -> Result<u32, DifficultyError> {
    Ok(target_to_compact(&difficulty_to_target(difficulty)?))
}

/// Split a positive finite `f64` into `(m, e)` with `value == m * 2^e`.
fn decompose(value: f64) -> (u64, i32) {
    let raw = value.to_bits();
    let biased = ((raw >> 52) & 0x7ff) as i32;
    let fraction = raw & ((1u64 << 52) - 1);
    if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    }
}
