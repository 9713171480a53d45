//! # cinder-core
//! Consensus types and engines for the Cinder protocol: wire codec,
//! crypto primitives, block/transaction model, UTXO accounting, the
//! block validator, the block tree and the miner.

pub mod chain;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod difficulty;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod merkle;
pub mod miner;
pub mod reward;
pub mod types;
pub mod utxo;
pub mod validation;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix seconds.
pub fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
