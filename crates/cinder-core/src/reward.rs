//! Block reward schedule.
//!
//! The reward starts at [`INITIAL_REWARD`](crate::constants::INITIAL_REWARD)
//! and halves every [`REWARD_HALVING_LEN`](crate::constants::REWARD_HALVING_LEN)
//! blocks by right shift, reaching zero once the shift exhausts the value.

use crate::constants::{INITIAL_REWARD, REWARD_HALVING_LEN};

/// The halving epoch a height falls in.
pub fn halving_epoch(height: u64) -> u64 {
    height / REWARD_HALVING_LEN
}

/// Maximum money a block at `height` may create beyond collected fees.
pub fn block_reward(height: u64) -> u64 {
    let epoch = halving_epoch(height);
    if epoch >= 64 {
        return 0;
    }
    INITIAL_REWARD >> epoch
}
