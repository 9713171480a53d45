//! Pool of unconfirmed transactions.
//!
//! The pool keeps a shadow UTXO set that already reflects every
//! admitted transaction, so admission is a plain application against a
//! copy of the shadow. On every head change the pool drops transactions
//! confirmed by the new chain, rebuilds the shadow from the
//! authoritative set and re-admits the survivors in their original
//! insertion order; transactions invalidated by the new chain (or by
//! re-admission order) are silently dropped. Transactions mined into an
//! abandoned fork re-enter the pool the same way when they still apply.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::chain::{common_ancestor, BlockTree, LinkedBlock};
use crate::constants::MIN_TX_FEE;
use crate::error::MempoolError;
use crate::types::{Hash256, Transaction};
use crate::utxo::UtxoSet;

type TxCallback = Box<dyn Fn(&Transaction) + Send + Sync>;

struct PoolState {
    txs: HashMap<Hash256, Transaction>,
    /// Admission order of the txids in `txs`.
    order: Vec<Hash256>,
    shadow: UtxoSet,
    total_fees: u64,
    /// Head the pool was last synchronised against.
    last_head: Arc<LinkedBlock>,
}

/// Unconfirmed transactions awaiting inclusion in a block.
pub struct Mempool {
    tree: Arc<BlockTree>,
    state: Mutex<PoolState>,
    callbacks: Mutex<Vec<TxCallback>>,
}

impl Mempool {
    pub fn new(tree: Arc<BlockTree>) -> Self {
        let shadow = tree.utxo_snapshot();
        let last_head = tree.head();
        Self {
            tree,
            state: Mutex::new(PoolState {
                txs: HashMap::new(),
                order: Vec::new(),
                shadow,
                total_fees: 0,
                last_head,
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback fired for every newly admitted transaction.
    /// Re-admission after a head change does not fire callbacks.
    pub fn subscribe(&self, callback: impl Fn(&Transaction) + Send + Sync + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Validate and admit a standalone transaction. Returns its fee.
    pub fn add_transaction(&self, tx: Transaction) -> Result<u64, MempoolError> {
        let fee = {
            let mut st = self.state.lock();
            Self::admit(&mut st, tx.clone())?
        };
        let callbacks = self.callbacks.lock();
        for callback in callbacks.iter() {
            callback(&tx);
        }
        Ok(fee)
    }

    /// Apply `tx` to the shadow set and commit it to the pool.
    fn admit(st: &mut PoolState, tx: Transaction) -> Result<u64, MempoolError> {
        let txid = tx.txid();
        if st.txs.contains_key(&txid) {
            return Err(MempoolError::AlreadyKnown);
        }

        // Validate on a copy; a rejected transaction must leave the
        // shadow untouched.
        let mut probe = st.shadow.clone();
        let height = probe.tip().height + 1;
        let fee = probe.apply_transaction(&tx, height, true)?;
        if fee < MIN_TX_FEE {
            return Err(MempoolError::FeeTooLow { fee, minimum: MIN_TX_FEE });
        }

        st.shadow = probe;
        st.txs.insert(txid, tx);
        st.order.push(txid);
        st.total_fees += fee;
        Ok(fee)
    }

    /// Resynchronise the pool after a head change.
    ///
    /// Transactions confirmed anywhere on the new branch are dropped;
    /// transactions from blocks the reorg abandoned are appended to the
    /// candidate list; everything is re-admitted in order against a
    /// fresh shadow.
    pub fn on_new_head(&self, head: &Arc<LinkedBlock>) {
        let mut st = self.state.lock();
        let old_head = std::mem::replace(&mut st.last_head, Arc::clone(head));
        let fork = common_ancestor(&old_head, head);

        // Txids confirmed on the new branch, fork exclusive.
        let mut confirmed = HashSet::new();
        let mut cur = Arc::clone(head);
        while cur.hash != fork.hash {
            for tx in &cur.block.transactions {
                confirmed.insert(tx.txid());
            }
            cur = cur.parent_or_self();
        }

        // Transactions mined into the abandoned side of the fork, in
        // chain order, oldest block first.
        let mut abandoned_blocks = Vec::new();
        let mut cur = Arc::clone(&old_head);
        while cur.hash != fork.hash {
            abandoned_blocks.push(Arc::clone(&cur));
            cur = cur.parent_or_self();
        }
        let mut abandoned = Vec::new();
        for block in abandoned_blocks.iter().rev() {
            for tx in &block.block.transactions {
                if !tx.is_coinbase() {
                    abandoned.push(tx.clone());
                }
            }
        }

        let old_order = std::mem::take(&mut st.order);
        let mut old_txs = std::mem::take(&mut st.txs);
        st.shadow = self.tree.utxo_snapshot();
        st.total_fees = 0;

        let pool_survivors: Vec<Transaction> = old_order
            .into_iter()
            .filter(|txid| !confirmed.contains(txid))
            .filter_map(|txid| old_txs.remove(&txid))
            .collect();

        for tx in pool_survivors.into_iter().chain(abandoned) {
            let txid = tx.txid();
            if confirmed.contains(&txid) {
                continue;
            }
            if let Err(err) = Self::admit(&mut st, tx) {
                debug!(tx = %txid, %err, "transaction dropped on head change");
            }
        }
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.state.lock().txs.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.state.lock().txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the fees of every pooled transaction.
    pub fn total_fees(&self) -> u64 {
        self.state.lock().total_fees
    }

    /// The pooled transactions in admission order.
    pub fn transactions(&self) -> Vec<Transaction> {
        let st = self.state.lock();
        st.order
            .iter()
            .filter_map(|txid| st.txs.get(txid).cloned())
            .collect()
    }
}
