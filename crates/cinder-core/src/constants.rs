//! Protocol constants. Amounts are plain integer units with no subdivision.

/// Seed bytes of the genesis block's `prev_hash` field.
pub const GENESIS_PREV_HASH: [u8; 32] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
    0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
    0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
    0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
];
pub const GENESIS_TIMESTAMP: u64 = 0;
pub const GENESIS_DIFFICULTY: u8 = 1;

/// Target seconds between blocks.
pub const BLOCK_TIME_SECS: u64 = 5;
/// Difficulty is retargeted every this many blocks.
pub const DIFF_PERIOD_LEN: u64 = 10;
/// Block reward halves every this many blocks.
pub const REWARD_HALVING_LEN: u64 = 1000;
/// Block reward during the first halving epoch.
pub const INITIAL_REWARD: u64 = 1000;

/// Minimum fee for mempool admission.
pub const MIN_TX_FEE: u64 = 10;
/// Maximum seconds a block timestamp may run ahead of the wall clock.
pub const MAX_FUTURE_DRIFT_SECS: u64 = 7200;
/// Number of ancestor timestamps in the median timestamp rule.
pub const TIMESTAMP_MEDIAN_WINDOW: usize = 10;

/// Nonces tried per batch between miner flag checks.
pub const MINING_BATCH_SIZE: u64 = 100_000;

pub const DEFAULT_PEER_PORT: u16 = 18350;
pub const DEFAULT_CONTROL_PORT: u16 = 18351;
