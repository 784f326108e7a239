//! Difficulty reporting for diagnostic stake searches.

use num_bigint::BigUint;

use ppcmint_core::difficulty::{
    compact_to_difficulty, difficulty_to_compact, increment_compact, target_to_compact,
};

use crate::error::MintError;

/// Best difficulty at which a found kernel still mints.
///
/// `min_target` is the loosest target the oracle reported as sufficient.
/// It is encoded compactly, bumped to the next compact bucket, and converted
/// to a difficulty. Compact encoding truncates the target downwards, so the
/// plain encoding can sit below `min_target`; the incremented bucket is the
/// first one that still covers it. The reported figure is therefore a hair
/// under the exact difficulty, never above it.
pub fn achievable_difficulty(min_target: &BigUint) -> f64 {
    compact_to_difficulty(increment_compact(target_to_compact(min_target)))
}

/// Compact target a diagnostic search runs against.
///
/// A zero override keeps the live network target. Any other value must be a
/// positive finite difficulty.
pub fn search_bits(live_bits: u32, difficulty_override: f64) -> Result<u32, MintError> {
    if difficulty_override == 0.0 {
        return Ok(live_bits);
    }
    Ok(difficulty_to_compact(difficulty_override)?)
}
