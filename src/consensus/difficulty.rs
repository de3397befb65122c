//! Difficulty retargeting
//!
//! Every `interval` blocks the target is recomputed from how long the previous
//! window actually took against the network's target timespan. All arithmetic
//! runs on the full 256-bit target; only the header field is compact.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use super::{BlockHeader, NetworkParams, VerificationError};

/// Maximum adjustment factor (4x in either direction per period)
const MAX_ADJUSTMENT_FACTOR: i128 = 4;

/// Decode the compact `nBits` form into a full target
///
/// The top byte is the length in bytes, the low 23 bits the mantissa and bit 23
/// a sign. Negative values are not valid targets and decode to zero.
pub fn decode_compact_bits(compact: u32) -> BigUint {
    let size = (compact >> 24) as usize;
    let mantissa = compact & 0x007f_ffff;

    if compact & 0x0080_0000 != 0 && mantissa != 0 {
        return BigUint::zero();
    }

    if size <= 3 {
        BigUint::from(mantissa >> (8 * (3 - size)))
    } else {
        BigUint::from(mantissa) << (8 * (size - 3))
    }
}

/// Encode a target into compact form, dropping all but the top three bytes
pub fn encode_compact_bits(target: &BigUint) -> u32 {
    let mut size = ((target.bits() + 7) / 8) as u32;

    let mut compact = if size <= 3 {
        target.to_u32().unwrap_or_default() << (8 * (3 - size))
    } else {
        (target >> (8 * (size as usize - 3))).to_u32().unwrap_or_default()
    };

    // Bit 23 is the sign; move a set high bit into the next byte instead.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | (size << 24)
}

/// Expected number of hashes to find a block at `target`: 2^256 / (target + 1)
pub fn work_from_target(target: &BigUint) -> BigUint {
    (BigUint::one() << 256usize) / (target + 1u32)
}

/// Check if difficulty must be recomputed for the block at this height
pub fn should_adjust_difficulty(height: u64, interval: u64) -> bool {
    height > 0 && interval > 0 && height % interval == 0
}

/// Compute the target for the block following `last`
///
/// `first` opens the retarget window and `last` closes it. The elapsed time
/// is clamped to a quarter and four times the target timespan, and the result
/// never gets easier than the proof-of-work limit.
pub fn compute_next_target(
    params: &NetworkParams,
    first: &BlockHeader,
    last: &BlockHeader,
) -> BigUint {
    // Timestamps use the full u64 range, so the difference can exceed i64.
    let target_timespan = i128::from(params.target_timespan);
    let elapsed = i128::from(last.timestamp) - i128::from(first.timestamp);
    let elapsed = elapsed
        .max(target_timespan / MAX_ADJUSTMENT_FACTOR)
        .min(target_timespan * MAX_ADJUSTMENT_FACTOR);
    let elapsed = u128::try_from(elapsed).unwrap_or_default();

    let mut next = last.target() * BigUint::from(elapsed) / BigUint::from(params.target_timespan);

    if next > params.proof_of_work_limit {
        tracing::info!(new_target = %format!("{next:x}"), "difficulty hit proof of work limit");
        next = params.proof_of_work_limit.clone();
    }

    next
}

/// Compare a computed target with the compact bits a block carries
///
/// The calculated target is more precise than the header can express, so it is
/// truncated to the precision of the received value first.
pub fn verify_difficulty_bits(calculated: &BigUint, received_bits: u32) -> Result<(), VerificationError> {
    let accuracy_bytes = (received_bits >> 24).saturating_sub(3) as usize;
    let mask = BigUint::from(0x00ff_ffffu32) << (accuracy_bytes * 8);
    let calculated = calculated & &mask;
    let received = decode_compact_bits(received_bits);

    if calculated != received {
        return Err(VerificationError::DifficultyTransition(format!(
            "Network provided difficulty bits do not match what was calculated: {calculated:x} vs {received:x}"
        )));
    }

    Ok(())
}
