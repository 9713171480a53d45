//! Chain-building helpers: deterministic keys, coinbases and solved
//! blocks with the difficulty the validator expects.

use std::sync::Arc;

use cinder_core::chain::{AddOutcome, BlockTree, LinkedBlock};
use cinder_core::crypto::KeyPair;
use cinder_core::difficulty::next_difficulty;
use cinder_core::reward::block_reward;
use cinder_core::types::{
    Block, BlockHeader, Hash256, Input, OutPoint, Output, PublicKey, Signature, Transaction,
};
use cinder_core::validation::hash_meets_difficulty;

/// Deterministic keypair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_seed([seed; 32])
}

pub fn pk(seed: u8) -> PublicKey {
    PublicKey([seed; 32])
}

/// A coinbase paying `amount` to `pubkey`; `index` disambiguates the
/// txid.
pub fn coinbase(amount: u64, pubkey: PublicKey, index: u32) -> Transaction {
    Transaction {
        inputs: vec![Input {
            prev: OutPoint::new(Hash256::ZERO, index),
            signature: Signature::ZERO,
        }],
        outputs: vec![Output { amount, pubkey }],
    }
}

/// A signed transaction spending `inputs` (all owned by `key`) into
/// `outputs`.
pub fn signed_tx(
    key: &KeyPair,
    inputs: &[OutPoint],
    outputs: &[(u64, PublicKey)],
) -> Transaction {
    let mut tx = Transaction {
        inputs: inputs
            .iter()
            .map(|prev| Input { prev: *prev, signature: Signature::ZERO })
            .collect(),
        outputs: outputs
            .iter()
            .map(|(amount, pubkey)| Output { amount: *amount, pubkey: *pubkey })
            .collect(),
    };
    let txid = tx.txid();
    let signature = key.sign(txid.as_bytes());
    for input in &mut tx.inputs {
        input.signature = signature;
    }
    tx
}

/// Build a solved block above `parent`: correct difficulty, coinbase
/// first (paying the block reward plus `fees` to `reward_to`), then
/// `txs`.
pub fn mine_block(
    parent: &Arc<LinkedBlock>,
    timestamp: u64,
    reward_to: PublicKey,
    fees: u64,
    txs: Vec<Transaction>,
) -> Block {
    let height = parent.height + 1;
    let mut transactions = vec![coinbase(block_reward(height) + fees, reward_to, height as u32)];
    transactions.extend(txs);
    let mut block = Block {
        header: BlockHeader {
            prev_hash: parent.hash,
            merkle_root: Hash256::ZERO,
            timestamp,
            diff: next_difficulty(parent),
            nonce: 0,
        },
        transactions,
    };
    block.update_merkle_root();
    solve(&mut block);
    block
}

/// Scan nonces until the block meets its own difficulty.
pub fn solve(block: &mut Block) {
    while !hash_meets_difficulty(&block.hash(), block.header.diff) {
        block.header.nonce += 1;
    }
}

/// Mine an empty block (coinbase only) into the tree and require it to
/// become the head.
pub fn extend_tree(tree: &BlockTree, timestamp: u64) -> Arc<LinkedBlock> {
    let parent = tree.head();
    let block = mine_block(&parent, timestamp, pk(0x99), 0, vec![]);
    let hash = block.hash();
    assert!(matches!(
        tree.add_block(block),
        AddOutcome::Added { new_head: true, .. }
    ));
    tree.get(&hash).expect("mined block in tree")
}

/// Total coins in the tree's UTXO set.
pub fn total_money(tree: &BlockTree) -> u64 {
    tree.utxo_snapshot().total_amount()
}
