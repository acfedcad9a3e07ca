//! # Common Block Heights
//!
//! Heights a syncing node probes when searching for the last block it shares
//! with a peer: the tip and its five predecessors, then eight exponentially
//! widening steps back from `b = h - 5`, namely `b - floor(b^(k/9))`.
//!
//! Roots are computed exactly on `U512` so every node derives the same list.

use primitive_types::U512;

/// Consecutive heights probed below the tip.
pub const CONSECUTIVE_PROBES: u64 = 5;

/// Exponential probes below the consecutive window.
pub const EXPONENTIAL_PROBES: u32 = 8;

const ROOT_DEGREE: u32 = 9;

/// Descending, duplicate-free list of positive heights to probe from `height`.
pub fn common_block_heights(height: u64) -> Vec<u64> {
    let mut heights: Vec<u64> = Vec::with_capacity((CONSECUTIVE_PROBES as usize) + 1 + 8);

    for offset in 0..=CONSECUTIVE_PROBES {
        match height.checked_sub(offset) {
            Some(h) if h > 0 => heights.push(h),
            _ => break,
        }
    }

    let base = match height.checked_sub(CONSECUTIVE_PROBES) {
        Some(b) if b > 0 => b,
        _ => return heights,
    };

    for k in 1..=EXPONENTIAL_PROBES {
        let candidate = base - floor_root_of_power(base, k, ROOT_DEGREE);
        let is_new = heights.last().map_or(true, |last| candidate < *last);
        if candidate > 0 && is_new {
            heights.push(candidate);
        }
    }

    heights
}

/// Largest `r` with `r^degree <= base^exp`, for `exp < degree`.
fn floor_root_of_power(base: u64, exp: u32, degree: u32) -> u64 {
    // base < 2^64 and exp <= 8, so base^exp fits in 512 bits.
    let target = U512::from(base).pow(U512::from(exp));
    let fits = |r: u64| {
        U512::from(r)
            .checked_pow(U512::from(degree))
            .is_some_and(|p| p <= target)
    };

    // The root of base^(exp/degree) never exceeds base.
    let (mut lo, mut hi) = (0u64, base);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
