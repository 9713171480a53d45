//! Difficulty retargeting.
//!
//! Difficulty is the number of leading zero bits a block hash must carry.
//! It is held constant within a period of
//! [`DIFF_PERIOD_LEN`](crate::constants::DIFF_PERIOD_LEN) blocks and
//! recomputed at each period boundary from how long the closing period
//! actually took:
//!
//! `next = floor(log2(2^diff · BLOCK_TIME · DIFF_PERIOD_LEN / Δt))`, min 1,
//!
//! where `Δt` spans the last `DIFF_PERIOD_LEN − 1` block intervals (the
//! boundary block back to the first block of its period). The narrow
//! window is protocol behaviour, not an off-by-one to fix.

use std::sync::Arc;

use crate::chain::LinkedBlock;
use crate::constants::{BLOCK_TIME_SECS, DIFF_PERIOD_LEN};

/// Smallest integer `m` with `2^m ≥ v`. `v` must be non-zero.
fn ceil_log2(v: u64) -> u32 {
    v.next_power_of_two().ilog2()
}

/// Apply the retarget formula to a closing period.
///
/// `span_secs` is the time the period took; a zero span counts as one
/// second. Since the difficulty exponent is an integer, the formula
/// reduces to `diff + floor(log2(target_span / span))`, which is exact
/// in integer arithmetic for any difficulty.
pub fn retarget(current: u8, span_secs: u64) -> u8 {
    let span = span_secs.max(1);
    let target_span = BLOCK_TIME_SECS * DIFF_PERIOD_LEN;
    let step: i32 = if span <= target_span {
        (target_span / span).ilog2() as i32
    } else {
        -(ceil_log2(span.div_ceil(target_span)) as i32)
    };
    (current as i32 + step).clamp(1, u8::MAX as i32) as u8
}

/// The difficulty required of the block following `parent`.
pub fn next_difficulty(parent: &Arc<LinkedBlock>) -> u8 {
    if (parent.height + 1) % DIFF_PERIOD_LEN != 0 {
        return parent.block.header.diff;
    }

    // Walk back to the first block of the closing period. The walk
    // saturates at genesis, which is its own parent.
    let mut first = Arc::clone(parent);
    for _ in 0..DIFF_PERIOD_LEN - 2 {
        first = first.parent_or_self();
    }

    let span = parent
        .block
        .header
        .timestamp
        .saturating_sub(first.block.header.timestamp);
    retarget(parent.block.header.diff, span)
}
