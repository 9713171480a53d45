//! The genesis block: hardcoded, deterministic, identical on every node.
//!
//! Genesis carries no transactions, so its merkle root is the double
//! SHA-256 of the empty string. It is its own chain anchor at height 0.

use std::sync::LazyLock;

use crate::constants::{GENESIS_DIFFICULTY, GENESIS_PREV_HASH, GENESIS_TIMESTAMP};
use crate::merkle;
use crate::types::{Block, BlockHeader, Hash256};

struct GenesisData {
    block: Block,
    hash: Hash256,
}

static GENESIS: LazyLock<GenesisData> = LazyLock::new(build_genesis);

fn build_genesis() -> GenesisData {
    let empty: [&[u8]; 0] = [];
    let block = Block {
        header: BlockHeader {
            prev_hash: Hash256(GENESIS_PREV_HASH),
            merkle_root: merkle::merkle_root(&empty),
            timestamp: GENESIS_TIMESTAMP,
            diff: GENESIS_DIFFICULTY,
            nonce: 0,
        },
        transactions: vec![],
    };
    let hash = block.hash();
    GenesisData { block, hash }
}

/// The genesis block (height 0).
pub fn genesis_block() -> &'static Block {
    &GENESIS.block
}

/// The genesis block's header hash.
pub fn genesis_hash() -> Hash256 {
    GENESIS.hash
}
