//! Unspent-output accounting.
//!
//! A [`UtxoSet`] is the authoritative map of spendable outputs for one
//! chain tip. Applying a block records an undo entry (the outputs it
//! spent) so the block can later be reverted during a reorganization;
//! [`UtxoSet::move_on_chain`] rewinds to the common ancestor and applies
//! forward along the target chain. Cloning the set is the snapshot
//! operation used for speculative validation and the mempool's shadow
//! copy.
//!
//! On an application error the set may be partially mutated; callers
//! validate on a clone and discard it on failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::chain::{common_ancestor, LinkedBlock};
use crate::crypto::verify_signature;
use crate::error::{ChainStateError, TransactionError};
use crate::types::{OutPoint, Output, Transaction};

/// An unspent output plus the height of the block that created it,
/// exposed as confirmation depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub output: Output,
    pub height: u64,
}

/// Undo record for one applied block: every UTXO its inputs consumed.
#[derive(Clone, Debug)]
struct BlockUndo {
    block_hash: crate::types::Hash256,
    spent: Vec<(OutPoint, Utxo)>,
}

/// The set of unspent outputs along one chain, from genesis to `tip`.
#[derive(Clone)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, Utxo>,
    undo: Vec<BlockUndo>,
    tip: Arc<LinkedBlock>,
}

impl UtxoSet {
    /// An empty set anchored at the given chain block (normally genesis,
    /// which carries no transactions).
    pub fn new(tip: Arc<LinkedBlock>) -> Self {
        Self { entries: HashMap::new(), undo: Vec::new(), tip }
    }

    /// The block this set is currently applied up to.
    pub fn tip(&self) -> &Arc<LinkedBlock> {
        &self.tip
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &Utxo)> {
        self.entries.iter()
    }

    /// Total amount across all unspent outputs.
    pub fn total_amount(&self) -> u64 {
        self.entries.values().map(|u| u.output.amount).sum()
    }

    /// Apply a transaction, spending its inputs and inserting its
    /// outputs at `height`.
    ///
    /// For a regular transaction the result is the fee
    /// (`inputs − outputs`); for a coinbase it is the money created
    /// (the output sum). With `verify` set, every spent output's
    /// signature is checked against the txid.
    pub fn apply_transaction(
        &mut self,
        tx: &Transaction,
        height: u64,
        verify: bool,
    ) -> Result<u64, TransactionError> {
        self.apply_tx_inner(tx, height, verify, None)
    }

    fn apply_tx_inner(
        &mut self,
        tx: &Transaction,
        height: u64,
        verify: bool,
        undo: Option<&mut Vec<(OutPoint, Utxo)>>,
    ) -> Result<u64, TransactionError> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(TransactionError::Empty);
        }

        if tx.is_coinbase() {
            let minted = tx.output_total().ok_or(TransactionError::ValueOverflow)?;
            self.insert_outputs(tx, height);
            return Ok(minted);
        }

        // Gather and check the spent outputs before touching the map,
        // so a bad transaction cannot remove half its inputs. A
        // coinbase-marker input in a regular transaction fails the
        // lookup here: the zero txid is never in the set.
        let txid = tx.txid();
        let mut spent: Vec<(OutPoint, Utxo)> = Vec::with_capacity(tx.inputs.len());
        let mut seen: HashSet<OutPoint> = HashSet::with_capacity(tx.inputs.len());
        let mut input_sum: u64 = 0;
        for (index, input) in tx.inputs.iter().enumerate() {
            if !seen.insert(input.prev) {
                return Err(TransactionError::UtxoNotFound(input.prev));
            }
            let utxo = self
                .entries
                .get(&input.prev)
                .ok_or(TransactionError::UtxoNotFound(input.prev))?;
            if verify
                && verify_signature(txid.as_bytes(), &utxo.output.pubkey, &input.signature)
                    .is_err()
            {
                return Err(TransactionError::BadSignature { index });
            }
            input_sum = input_sum
                .checked_add(utxo.output.amount)
                .ok_or(TransactionError::ValueOverflow)?;
            spent.push((input.prev, utxo.clone()));
        }

        let output_sum = tx.output_total().ok_or(TransactionError::ValueOverflow)?;
        if input_sum < output_sum {
            return Err(TransactionError::AmountUnderflow {
                inputs: input_sum,
                outputs: output_sum,
            });
        }

        for (outpoint, _) in &spent {
            self.entries.remove(outpoint);
        }
        self.insert_outputs(tx, height);
        if let Some(undo) = undo {
            undo.extend(spent);
        }

        Ok(input_sum - output_sum)
    }

    fn insert_outputs(&mut self, tx: &Transaction, height: u64) {
        let txid = tx.txid();
        for (index, output) in tx.outputs.iter().enumerate() {
            self.entries.insert(
                OutPoint::new(txid, index as u32),
                Utxo { output: output.clone(), height },
            );
        }
    }

    /// Apply a whole block on top of the current tip.
    ///
    /// The first transaction must be the block's single coinbase; the
    /// rest must be regular transactions. Returns the money the block
    /// created: the coinbase output sum less the fees it collected.
    pub fn apply_block(
        &mut self,
        block: &Arc<LinkedBlock>,
        verify: bool,
    ) -> Result<u64, TransactionError> {
        debug_assert_eq!(block.block.header.prev_hash, self.tip.hash);

        let txs = &block.block.transactions;
        // Only genesis carries no transactions, and genesis is never applied.
        if !txs.first().is_some_and(Transaction::is_coinbase) {
            return Err(TransactionError::MissingCoinbase);
        }
        let minted = self.apply_tx_inner(&txs[0], block.height, verify, None)?;

        let mut spent = Vec::new();
        let mut fees: u64 = 0;
        for tx in &txs[1..] {
            if tx.is_coinbase() {
                return Err(TransactionError::UnexpectedCoinbase);
            }
            let fee = self.apply_tx_inner(tx, block.height, verify, Some(&mut spent))?;
            fees = fees.checked_add(fee).ok_or(TransactionError::ValueOverflow)?;
        }

        self.undo.push(BlockUndo { block_hash: block.hash, spent });
        self.tip = Arc::clone(block);
        Ok(minted.saturating_sub(fees))
    }

    /// Undo the most recently applied block: remove the outputs it
    /// created and restore the outputs it spent.
    pub fn revert_block(&mut self, block: &Arc<LinkedBlock>) -> Result<(), ChainStateError> {
        if block.hash != self.tip.hash || block.is_genesis() {
            return Err(ChainStateError::NotTip);
        }
        let undo = match self.undo.pop() {
            Some(undo) if undo.block_hash == block.hash => undo,
            Some(undo) => {
                // Mismatched record: put it back and refuse.
                self.undo.push(undo);
                return Err(ChainStateError::MissingUndo);
            }
            None => return Err(ChainStateError::MissingUndo),
        };

        // Restore the spent outputs first, then delete everything the
        // block created. A spent output that was itself created by this
        // block (sequential intra-block spend) is re-inserted and then
        // correctly swept away by the removal pass.
        for (outpoint, utxo) in undo.spent {
            self.entries.insert(outpoint, utxo);
        }
        for tx in block.block.transactions.iter().rev() {
            let txid = tx.txid();
            for index in 0..tx.outputs.len() {
                self.entries.remove(&OutPoint::new(txid, index as u32));
            }
        }

        // revert_block rejects genesis above, so a parent exists.
        if let Some(parent) = block.parent() {
            self.tip = Arc::clone(parent);
        }
        Ok(())
    }

    /// Move the set onto the chain ending at `target`: revert back to
    /// the common ancestor with the current tip, then apply forward.
    ///
    /// Blocks applied here were validated when they entered the tree,
    /// so signatures are not re-checked.
    pub fn move_on_chain(&mut self, target: &Arc<LinkedBlock>) -> Result<(), ChainStateError> {
        let ancestor = common_ancestor(&self.tip, target);

        while self.tip.hash != ancestor.hash {
            let tip = Arc::clone(&self.tip);
            self.revert_block(&tip)?;
        }

        let mut forward = Vec::new();
        let mut cur = Arc::clone(target);
        while cur.hash != ancestor.hash {
            forward.push(Arc::clone(&cur));
            cur = cur.parent_or_self();
        }
        for block in forward.iter().rev() {
            self.apply_block(block, false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::genesis_linked;
    use crate::crypto::KeyPair;
    use crate::types::{Block, BlockHeader, Hash256, Input, PublicKey, Signature};

    fn pk(seed: u8) -> PublicKey {
        PublicKey([seed; 32])
    }

    fn coinbase(amount: u64, pubkey: PublicKey, index: u32) -> Transaction {
        Transaction {
            inputs: vec![Input {
                prev: OutPoint::new(Hash256::ZERO, index),
                signature: Signature::ZERO,
            }],
            outputs: vec![Output { amount, pubkey }],
        }
    }

    /// Link an unvalidated block; UTXO tests do not care about PoW.
    fn link(parent: &Arc<LinkedBlock>, timestamp: u64, txs: Vec<Transaction>) -> Arc<LinkedBlock> {
        let mut block = Block {
            header: BlockHeader {
                prev_hash: parent.hash,
                merkle_root: Hash256::ZERO,
                timestamp,
                diff: 1,
                nonce: 0,
            },
            transactions: txs,
        };
        block.update_merkle_root();
        LinkedBlock::link(block, parent)
    }

    /// A signed spend of `outpoint` paying `outputs`.
    fn signed_spend(
        key: &KeyPair,
        outpoint: OutPoint,
        outputs: Vec<(u64, PublicKey)>,
    ) -> Transaction {
        let mut tx = Transaction {
            inputs: vec![Input { prev: outpoint, signature: Signature::ZERO }],
            outputs: outputs
                .into_iter()
                .map(|(amount, pubkey)| Output { amount, pubkey })
                .collect(),
        };
        let txid = tx.txid();
        tx.inputs[0].signature = key.sign(txid.as_bytes());
        tx
    }

    // --- apply_transaction ---

    #[test]
    fn coinbase_mints_outputs() {
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, pk(1), 0);
        let minted = set.apply_transaction(&cb, 1, true).unwrap();
        assert_eq!(minted, 1000);
        assert_eq!(set.len(), 1);
        let utxo = set.get(&OutPoint::new(cb.txid(), 0)).unwrap();
        assert_eq!(utxo.output.amount, 1000);
        assert_eq!(utxo.height, 1);
    }

    #[test]
    fn empty_transaction_rejected() {
        let mut set = UtxoSet::new(genesis_linked());
        let tx = Transaction { inputs: vec![], outputs: vec![] };
        assert_eq!(set.apply_transaction(&tx, 1, true), Err(TransactionError::Empty));
    }

    #[test]
    fn spend_returns_fee_and_moves_outputs() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let spend = signed_spend(
            &key,
            OutPoint::new(cb.txid(), 0),
            vec![(400, pk(2)), (500, key.public_key())],
        );
        let fee = set.apply_transaction(&spend, 2, true).unwrap();
        assert_eq!(fee, 100);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&OutPoint::new(cb.txid(), 0)));
        assert_eq!(set.get(&OutPoint::new(spend.txid(), 0)).unwrap().output.amount, 400);
        assert_eq!(set.total_amount(), 900);
    }

    #[test]
    fn unknown_utxo_rejected() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let missing = OutPoint::new(Hash256([9; 32]), 0);
        let spend = signed_spend(&key, missing, vec![(1, pk(2))]);
        assert_eq!(
            set.apply_transaction(&spend, 1, true),
            Err(TransactionError::UtxoNotFound(missing))
        );
    }

    #[test]
    fn bad_signature_rejected() {
        let key = KeyPair::from_seed([1; 32]);
        let wrong = KeyPair::from_seed([2; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let spend = signed_spend(&wrong, OutPoint::new(cb.txid(), 0), vec![(900, pk(2))]);
        assert_eq!(
            set.apply_transaction(&spend, 2, true),
            Err(TransactionError::BadSignature { index: 0 })
        );
        // Nothing was mutated.
        assert!(set.contains(&OutPoint::new(cb.txid(), 0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unverified_apply_skips_signature_check() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let mut spend = signed_spend(&key, OutPoint::new(cb.txid(), 0), vec![(900, pk(2))]);
        spend.inputs[0].signature = Signature::ZERO;
        assert!(set.apply_transaction(&spend, 2, false).is_ok());
    }

    #[test]
    fn amount_underflow_rejected() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(100, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let spend = signed_spend(&key, OutPoint::new(cb.txid(), 0), vec![(101, pk(2))]);
        assert_eq!(
            set.apply_transaction(&spend, 2, true),
            Err(TransactionError::AmountUnderflow { inputs: 100, outputs: 101 })
        );
    }

    #[test]
    fn duplicate_input_in_one_tx_rejected() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let op = OutPoint::new(cb.txid(), 0);
        let mut tx = Transaction {
            inputs: vec![
                Input { prev: op, signature: Signature::ZERO },
                Input { prev: op, signature: Signature::ZERO },
            ],
            outputs: vec![Output { amount: 1500, pubkey: pk(2) }],
        };
        let txid = tx.txid();
        let sig = key.sign(txid.as_bytes());
        tx.inputs[0].signature = sig;
        tx.inputs[1].signature = sig;
        assert_eq!(
            set.apply_transaction(&tx, 2, true),
            Err(TransactionError::UtxoNotFound(op))
        );
    }

    #[test]
    fn double_spend_across_transactions_rejected() {
        let key = KeyPair::from_seed([1; 32]);
        let mut set = UtxoSet::new(genesis_linked());
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let op = OutPoint::new(cb.txid(), 0);
        let first = signed_spend(&key, op, vec![(900, pk(2))]);
        let second = signed_spend(&key, op, vec![(800, pk(3))]);
        set.apply_transaction(&first, 2, true).unwrap();
        assert_eq!(
            set.apply_transaction(&second, 2, true),
            Err(TransactionError::UtxoNotFound(op))
        );
    }

    // --- apply_block / revert_block ---

    #[test]
    fn apply_block_requires_leading_coinbase() {
        let key = KeyPair::from_seed([1; 32]);
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let spend = signed_spend(&key, OutPoint::new(Hash256([9; 32]), 0), vec![(1, pk(2))]);
        let block = link(&genesis, 1, vec![spend]);
        assert_eq!(
            set.apply_block(&block, true),
            Err(TransactionError::MissingCoinbase)
        );
    }

    #[test]
    fn apply_block_rejects_second_coinbase() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let block = link(
            &genesis,
            1,
            vec![coinbase(1000, pk(1), 0), coinbase(1000, pk(2), 1)],
        );
        assert_eq!(
            set.apply_block(&block, true),
            Err(TransactionError::UnexpectedCoinbase)
        );
    }

    #[test]
    fn apply_block_money_created_nets_out_fees() {
        let key = KeyPair::from_seed([1; 32]);
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));

        let cb1 = coinbase(1000, key.public_key(), 1);
        let b1 = link(&genesis, 1, vec![cb1.clone()]);
        assert_eq!(set.apply_block(&b1, true).unwrap(), 1000);

        // Block 2 collects a 100 fee; its coinbase pays reward + fee.
        let spend = signed_spend(&key, OutPoint::new(cb1.txid(), 0), vec![(900, pk(2))]);
        let b2 = link(&b1, 2, vec![coinbase(1100, pk(9), 2), spend]);
        assert_eq!(set.apply_block(&b2, true).unwrap(), 1000);
        assert_eq!(set.tip().hash, b2.hash);
        assert_eq!(set.total_amount(), 2000);
    }

    #[test]
    fn revert_restores_spent_outputs() {
        let key = KeyPair::from_seed([1; 32]);
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));

        let cb1 = coinbase(1000, key.public_key(), 1);
        let b1 = link(&genesis, 1, vec![cb1.clone()]);
        set.apply_block(&b1, true).unwrap();

        let spend = signed_spend(&key, OutPoint::new(cb1.txid(), 0), vec![(900, pk(2))]);
        let spend_txid = spend.txid();
        let b2 = link(&b1, 2, vec![coinbase(1100, pk(9), 2), spend]);
        set.apply_block(&b2, true).unwrap();

        set.revert_block(&b2).unwrap();
        assert_eq!(set.tip().hash, b1.hash);
        assert_eq!(set.len(), 1);
        let restored = set.get(&OutPoint::new(cb1.txid(), 0)).unwrap();
        assert_eq!(restored.output.amount, 1000);
        assert_eq!(restored.height, 1);
        assert!(!set.contains(&OutPoint::new(spend_txid, 0)));
    }

    #[test]
    fn revert_handles_intra_block_spend() {
        // A body transaction may spend the same block's coinbase; the
        // revert must not resurrect that coinbase output.
        let key = KeyPair::from_seed([1; 32]);
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));

        let cb = coinbase(1000, key.public_key(), 1);
        let spend = signed_spend(&key, OutPoint::new(cb.txid(), 0), vec![(900, pk(2))]);
        let spend_txid = spend.txid();
        let block = link(&genesis, 1, vec![cb.clone(), spend]);

        assert_eq!(set.apply_block(&block, true).unwrap(), 900);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&OutPoint::new(spend_txid, 0)));

        set.revert_block(&block).unwrap();
        assert!(set.is_empty());
        assert!(!set.contains(&OutPoint::new(cb.txid(), 0)));
        assert_eq!(set.tip().hash, genesis.hash);
    }

    #[test]
    fn revert_requires_tip() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let b1 = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        let b2 = link(&b1, 2, vec![coinbase(1000, pk(1), 2)]);
        set.apply_block(&b1, true).unwrap();
        set.apply_block(&b2, true).unwrap();
        assert_eq!(set.revert_block(&b1), Err(ChainStateError::NotTip));
    }

    #[test]
    fn revert_genesis_refused() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        assert_eq!(set.revert_block(&genesis), Err(ChainStateError::NotTip));
    }

    // --- move_on_chain ---

    fn utxo_keys(set: &UtxoSet) -> Vec<OutPoint> {
        let mut keys: Vec<OutPoint> = set.iter().map(|(op, _)| *op).collect();
        keys.sort();
        keys
    }

    #[test]
    fn move_forward_applies_blocks() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let b1 = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        let b2 = link(&b1, 2, vec![coinbase(1000, pk(2), 2)]);

        set.move_on_chain(&b2).unwrap();
        assert_eq!(set.tip().hash, b2.hash);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn move_across_fork_reverts_and_applies() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));

        let shared = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        let a1 = link(&shared, 2, vec![coinbase(1000, pk(0xA1), 2)]);
        let a2 = link(&a1, 3, vec![coinbase(1000, pk(0xA2), 3)]);
        let b1 = link(&shared, 4, vec![coinbase(1000, pk(0xB1), 2)]);

        set.move_on_chain(&a2).unwrap();
        assert_eq!(set.len(), 3);

        set.move_on_chain(&b1).unwrap();
        assert_eq!(set.tip().hash, b1.hash);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&OutPoint::new(
            shared.block.transactions[0].txid(),
            0
        )));
        assert!(set.contains(&OutPoint::new(b1.block.transactions[0].txid(), 0)));
    }

    #[test]
    fn move_on_chain_round_trip_is_identity() {
        // move A, move B, move A leaves the set identical to moving
        // straight to A.
        let genesis = genesis_linked();
        let shared = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        let a1 = link(&shared, 2, vec![coinbase(1000, pk(0xA1), 2)]);
        let a2 = link(&a1, 3, vec![coinbase(1000, pk(0xA2), 3)]);
        let b1 = link(&shared, 4, vec![coinbase(1000, pk(0xB1), 2)]);

        let mut direct = UtxoSet::new(Arc::clone(&genesis));
        direct.move_on_chain(&a2).unwrap();

        let mut wandering = UtxoSet::new(Arc::clone(&genesis));
        wandering.move_on_chain(&a2).unwrap();
        wandering.move_on_chain(&b1).unwrap();
        wandering.move_on_chain(&a2).unwrap();

        assert_eq!(wandering.tip().hash, direct.tip().hash);
        assert_eq!(utxo_keys(&wandering), utxo_keys(&direct));
        assert_eq!(wandering.total_amount(), direct.total_amount());
    }

    #[test]
    fn move_to_current_tip_is_noop() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let b1 = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        set.move_on_chain(&b1).unwrap();
        let before = utxo_keys(&set);
        set.move_on_chain(&b1).unwrap();
        assert_eq!(utxo_keys(&set), before);
    }

    #[test]
    fn move_backward_only() {
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let b1 = link(&genesis, 1, vec![coinbase(1000, pk(1), 1)]);
        let b2 = link(&b1, 2, vec![coinbase(1000, pk(2), 2)]);
        set.move_on_chain(&b2).unwrap();

        set.move_on_chain(&b1).unwrap();
        assert_eq!(set.tip().hash, b1.hash);
        assert_eq!(set.len(), 1);

        set.move_on_chain(&genesis).unwrap();
        assert_eq!(set.tip().hash, genesis.hash);
        assert!(set.is_empty());
    }

    // --- snapshots ---

    #[test]
    fn clone_is_independent() {
        let key = KeyPair::from_seed([1; 32]);
        let genesis = genesis_linked();
        let mut set = UtxoSet::new(Arc::clone(&genesis));
        let cb = coinbase(1000, key.public_key(), 0);
        set.apply_transaction(&cb, 1, false).unwrap();

        let mut snapshot = set.clone();
        let spend = signed_spend(&key, OutPoint::new(cb.txid(), 0), vec![(900, pk(2))]);
        snapshot.apply_transaction(&spend, 2, true).unwrap();

        // The original still holds the unspent output.
        assert!(set.contains(&OutPoint::new(cb.txid(), 0)));
        assert!(!snapshot.contains(&OutPoint::new(cb.txid(), 0)));
    }
}
