//! Block validation.
//!
//! Rules run in a fixed order and short-circuit on the first failure:
//! linkage, timestamp bounds, expected difficulty, proof-of-work,
//! merkle root, transaction application, reward ceiling. The caller
//! hands in a disposable UTXO copy; this module rewinds it to the
//! block's parent and leaves it at the block itself on success.

use std::sync::Arc;

use crate::chain::LinkedBlock;
use crate::constants::{MAX_FUTURE_DRIFT_SECS, TIMESTAMP_MEDIAN_WINDOW};
use crate::difficulty::next_difficulty;
use crate::error::BlockError;
use crate::reward::block_reward;
use crate::types::Hash256;
use crate::utxo::UtxoSet;

/// Whether a block hash carries at least `diff` leading zero bits,
/// i.e. `hash < 2^(256 − diff)` read as a big-endian integer.
pub fn hash_meets_difficulty(hash: &Hash256, diff: u8) -> bool {
    let bits = diff as usize;
    let bytes = hash.as_bytes();
    let full = bits / 8;
    let rem = bits % 8;
    if bytes[..full].iter().any(|&b| b != 0) {
        return false;
    }
    rem == 0 || bytes[full] >> (8 - rem) == 0
}

/// Whether `timestamp` is at or above the median of the
/// [`TIMESTAMP_MEDIAN_WINDOW`] timestamps ending at `parent`.
///
/// The walk saturates at genesis, repeating its timestamp. The median
/// of the even-sized window is the mean of the two middle values and
/// may be half-integral, so the comparison is done on doubled values.
fn timestamp_at_or_above_median(timestamp: u64, parent: &Arc<LinkedBlock>) -> bool {
    let mut stamps = Vec::with_capacity(TIMESTAMP_MEDIAN_WINDOW);
    let mut cur = Arc::clone(parent);
    for _ in 0..TIMESTAMP_MEDIAN_WINDOW {
        stamps.push(cur.block.header.timestamp);
        cur = cur.parent_or_self();
    }
    stamps.sort_unstable();
    let lo = stamps[TIMESTAMP_MEDIAN_WINDOW / 2 - 1] as u128;
    let hi = stamps[TIMESTAMP_MEDIAN_WINDOW / 2] as u128;
    2 * timestamp as u128 >= lo + hi
}

/// Validate `block` against its linked parent, applying it to `utxos`.
///
/// `utxos` is a working copy of the authoritative set; on success it
/// ends up applied through `block`, on failure it must be discarded.
/// `now` is the wall clock for the future-drift bound.
pub fn validate_block(
    block: &Arc<LinkedBlock>,
    utxos: &mut UtxoSet,
    now: u64,
) -> Result<(), BlockError> {
    // 1. Linkage.
    let parent = block.parent().ok_or(BlockError::MissingParent)?;
    if block.block.header.prev_hash != parent.hash {
        return Err(BlockError::BadLinkage);
    }
    debug_assert_eq!(block.height, parent.height + 1);

    // 2. Timestamp bounds.
    let timestamp = block.block.header.timestamp;
    let limit = now.saturating_add(MAX_FUTURE_DRIFT_SECS);
    if timestamp > limit {
        return Err(BlockError::TimestampTooNew { timestamp, limit });
    }
    if !timestamp_at_or_above_median(timestamp, parent) {
        return Err(BlockError::TimestampBeforeMedian);
    }

    // 3. Difficulty.
    let expected = next_difficulty(parent);
    let diff = block.block.header.diff;
    if diff != expected {
        return Err(BlockError::WrongDifficulty { got: diff, expected });
    }

    // 4. Proof-of-work.
    if !hash_meets_difficulty(&block.hash, diff) {
        return Err(BlockError::InsufficientPow);
    }

    // 5. Merkle root.
    if block.block.compute_merkle_root() != block.block.header.merkle_root {
        return Err(BlockError::BadMerkleRoot);
    }

    // 6. Transactions, on the copy rewound to the parent.
    utxos.move_on_chain(parent)?;
    let created = utxos.apply_block(block, true)?;

    // 7. Reward ceiling.
    let allowed = block_reward(block.height);
    if created > allowed {
        return Err(BlockError::ExcessiveReward { created, allowed });
    }

    Ok(())
}
