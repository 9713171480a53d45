//! Block tree and chain head tracking.
//!
//! [`BlockTree`] stores every validated block, parks blocks whose parent
//! is still unknown, and keeps the head at the greatest validated height
//! (first seen wins on ties). All tree state, including the
//! authoritative UTXO set, is guarded by one mutex; validated blocks and
//! their ancestors are immutable, so readers holding an
//! [`Arc<LinkedBlock>`] walk the chain without any lock.
//!
//! Head changes are published synchronously to subscribers, in
//! registration order, under a callback mutex separate from the tree
//! state so subscribers can re-enter the tree.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::genesis::{genesis_block, genesis_hash};
use crate::types::{Block, Hash256};
use crate::unix_time;
use crate::utxo::UtxoSet;
use crate::validation;

/// A block linked into the tree: immutable once created.
///
/// `parent` is `None` only for genesis; every ancestor walk treats
/// genesis as its own parent.
#[derive(Debug)]
pub struct LinkedBlock {
    pub block: Block,
    pub hash: Hash256,
    pub height: u64,
    parent: Option<Arc<LinkedBlock>>,
}

impl LinkedBlock {
    /// Link a block under its parent, deriving hash and height.
    pub fn link(block: Block, parent: &Arc<LinkedBlock>) -> Arc<Self> {
        let hash = block.hash();
        Arc::new(Self {
            block,
            hash,
            height: parent.height + 1,
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&Arc<LinkedBlock>> {
        self.parent.as_ref()
    }

    /// The parent, or the block itself at genesis.
    pub fn parent_or_self(self: &Arc<Self>) -> Arc<Self> {
        match &self.parent {
            Some(parent) => Arc::clone(parent),
            None => Arc::clone(self),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }

    /// Walk up to the ancestor at `height` (which must not exceed this
    /// block's height).
    pub fn ancestor_at(self: &Arc<Self>, height: u64) -> Arc<Self> {
        let mut cur = Arc::clone(self);
        while cur.height > height {
            cur = cur.parent_or_self();
        }
        cur
    }
}

/// The genesis block as a linked chain anchor.
pub fn genesis_linked() -> Arc<LinkedBlock> {
    Arc::new(LinkedBlock {
        block: genesis_block().clone(),
        hash: genesis_hash(),
        height: 0,
        parent: None,
    })
}

/// Deepest block on both chains: equalise heights, then walk both sides
/// in lockstep until they meet. Genesis is a common ancestor of
/// everything, so the walk always terminates.
pub fn common_ancestor(a: &Arc<LinkedBlock>, b: &Arc<LinkedBlock>) -> Arc<LinkedBlock> {
    let floor = a.height.min(b.height);
    let mut a = a.ancestor_at(floor);
    let mut b = b.ancestor_at(floor);
    while a.hash != b.hash {
        a = a.parent_or_self();
        b = b.parent_or_self();
    }
    a
}

/// Result of offering a block to the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// Hash already present, validated or parked.
    AlreadyKnown,
    /// Parent unknown; parked until it arrives.
    Parked,
    /// Failed validation and was dropped.
    Rejected,
    /// Entered the validated set.
    Added {
        /// Whether the head moved to this block.
        new_head: bool,
        /// Blocks unwound from the old head when the head moved across
        /// a fork; zero for a plain extension.
        reorg_depth: u64,
    },
}

type HeadCallback = Box<dyn Fn(&Arc<LinkedBlock>) + Send + Sync>;

struct TreeState {
    blocks: HashMap<Hash256, Arc<LinkedBlock>>,
    pending: HashMap<Hash256, Block>,
    head: Arc<LinkedBlock>,
    utxos: UtxoSet,
}

/// All known blocks plus the authoritative UTXO set.
pub struct BlockTree {
    state: Mutex<TreeState>,
    callbacks: Mutex<Vec<HeadCallback>>,
}

impl BlockTree {
    pub fn new() -> Self {
        let genesis = genesis_linked();
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash, Arc::clone(&genesis));
        Self {
            state: Mutex::new(TreeState {
                blocks,
                pending: HashMap::new(),
                head: Arc::clone(&genesis),
                utxos: UtxoSet::new(genesis),
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// The current head. Every ancestor of the returned block is
    /// immutable and may be read without locking.
    pub fn head(&self) -> Arc<LinkedBlock> {
        Arc::clone(&self.state.lock().head)
    }

    /// Look up a validated block by hash.
    pub fn get(&self, hash: &Hash256) -> Option<Arc<LinkedBlock>> {
        self.state.lock().blocks.get(hash).cloned()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.state.lock().blocks.contains_key(hash)
    }

    /// Number of validated blocks, genesis included.
    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        false // genesis is always present
    }

    /// Number of parked blocks waiting for a parent.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Snapshot of the authoritative UTXO set at the current head.
    pub fn utxo_snapshot(&self) -> UtxoSet {
        self.state.lock().utxos.clone()
    }

    /// Register a head-change callback, fired synchronously after every
    /// head update in registration order.
    pub fn subscribe(&self, callback: impl Fn(&Arc<LinkedBlock>) + Send + Sync + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Offer a block to the tree, then revisit any parked blocks that
    /// were waiting for it. Validation failures are logged and dropped;
    /// callers observe them only through the returned outcome.
    pub fn add_block(&self, block: Block) -> AddOutcome {
        let hash = block.hash();
        let outcome = self.insert_one(block, hash);

        if matches!(outcome, AddOutcome::Added { .. }) {
            let mut ready = vec![hash];
            while let Some(parent_hash) = ready.pop() {
                for (child_hash, child) in self.take_children_of(&parent_hash) {
                    if matches!(self.insert_one(child, child_hash), AddOutcome::Added { .. }) {
                        ready.push(child_hash);
                    }
                }
            }
        }

        outcome
    }

    /// Remove and return parked blocks whose parent is `parent_hash`.
    fn take_children_of(&self, parent_hash: &Hash256) -> Vec<(Hash256, Block)> {
        let mut st = self.state.lock();
        let hashes: Vec<Hash256> = st
            .pending
            .iter()
            .filter(|(_, b)| b.header.prev_hash == *parent_hash)
            .map(|(h, _)| *h)
            .collect();
        hashes
            .into_iter()
            .filter_map(|h| st.pending.remove(&h).map(|b| (h, b)))
            .collect()
    }

    fn insert_one(&self, block: Block, hash: Hash256) -> AddOutcome {
        // Duplicate and orphan handling happen under the state lock;
        // validation runs on a snapshot outside it.
        let (parent, snapshot) = {
            let mut st = self.state.lock();
            if st.blocks.contains_key(&hash) || st.pending.contains_key(&hash) {
                return AddOutcome::AlreadyKnown;
            }
            let prev = block.header.prev_hash;
            let Some(parent) = st.blocks.get(&prev).cloned() else {
                debug!(block = %hash, "parking block with unknown parent");
                st.pending.insert(hash, block);
                return AddOutcome::Parked;
            };
            (parent, st.utxos.clone())
        };

        let linked = LinkedBlock::link(block, &parent);
        let mut working = snapshot;
        if let Err(err) = validation::validate_block(&linked, &mut working, unix_time()) {
            info!(block = %hash, %err, "invalid block dropped");
            return AddOutcome::Rejected;
        }

        let mut head_event = None;
        let mut reorg_depth = 0u64;
        {
            let mut st = self.state.lock();
            if st.blocks.contains_key(&hash) {
                return AddOutcome::AlreadyKnown;
            }
            st.blocks.insert(hash, Arc::clone(&linked));

            // Ties at equal height never move the head.
            if linked.height > st.head.height {
                let old_head = Arc::clone(&st.head);
                if let Err(err) = st.utxos.move_on_chain(&linked) {
                    error!(block = %hash, %err, "failed to move UTXO set onto new head");
                    return AddOutcome::Rejected;
                }
                st.head = Arc::clone(&linked);

                if linked.block.header.prev_hash != old_head.hash {
                    let fork = common_ancestor(&old_head, &linked);
                    reorg_depth = old_head.height - fork.height;
                    info!(reorg_depth, "longer chain found, reorganizing");
                }
                info!(height = linked.height, block = %hash, "new chain head");
                head_event = Some(Arc::clone(&linked));
            }
        }

        let new_head = head_event.is_some();
        if let Some(head) = head_event {
            let callbacks = self.callbacks.lock();
            for callback in callbacks.iter() {
                callback(&head);
            }
        }

        AddOutcome::Added { new_head, reorg_depth }
    }
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new()
    }
}
