//! Node composition and driver loop.
//!
//! [`Node::new`] wires the block tree, mempool, miner, wallet and peer
//! transport together. Subscription order matters: the mempool
//! resynchronises before the miner retargets, so every new candidate
//! block sees the rebuilt pool.
//!
//! [`Node::run`] is the driver loop: it moves inbound peer traffic into
//! the tree and mempool, and solved blocks from the miner into the tree
//! and out to the peer. The miner itself never touches the tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use cinder_core::chain::BlockTree;
use cinder_core::error::MempoolError;
use cinder_core::mempool::Mempool;
use cinder_core::miner::Miner;
use cinder_core::types::{Hash256, Transaction};
use cinder_wallet::Wallet;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::peer::Peer;

/// Driver loop poll interval.
const DRIVE_INTERVAL: Duration = Duration::from_millis(50);

/// A running node: chain state, pool, miner, wallet and transport.
pub struct Node {
    pub config: NodeConfig,
    pub tree: Arc<BlockTree>,
    pub mempool: Arc<Mempool>,
    pub miner: Arc<Miner>,
    pub wallet: Mutex<Wallet>,
    pub peer: Option<Arc<Peer>>,
    shutdown: AtomicBool,
}

impl Node {
    /// Assemble a node from configuration. The wallet file is created
    /// on first use; mining rewards default to the wallet's first
    /// address.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let tree = Arc::new(BlockTree::new());
        let mempool = Arc::new(Mempool::new(Arc::clone(&tree)));
        let wallet = Wallet::open(config.wallet_path(), Arc::clone(&tree))?;
        let miner = Arc::new(Miner::new(
            Arc::clone(&tree),
            Arc::clone(&mempool),
            wallet.default_address(),
        ));

        // Mempool first, miner second: candidates must see the pool
        // rebuilt for the new head.
        {
            let mempool = Arc::clone(&mempool);
            tree.subscribe(move |head| mempool.on_new_head(head));
        }
        {
            let miner = Arc::clone(&miner);
            tree.subscribe(move |_| miner.retarget());
        }
        {
            let miner = Arc::clone(&miner);
            mempool.subscribe(move |_| miner.retarget());
        }

        let peer = if config.peer.enabled {
            Some(Peer::spawn(config.peer.clone(), Arc::clone(&tree))?)
        } else {
            None
        };

        Ok(Arc::new(Self {
            config,
            tree,
            mempool,
            miner,
            wallet: Mutex::new(wallet),
            peer,
            shutdown: AtomicBool::new(false),
        }))
    }

    /// Admit a locally created transaction and relay it to the peer.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash256, MempoolError> {
        let txid = tx.txid();
        self.mempool.add_transaction(tx.clone())?;
        if let Some(peer) = &self.peer {
            peer.broadcast_transaction(&tx);
        }
        info!(tx = %txid, "transaction submitted");
        Ok(txid)
    }

    /// One-line summaries of the last `limit` blocks, newest first.
    pub fn tip_summary(&self, limit: usize) -> String {
        let mut entries = Vec::new();
        let mut cur = self.tree.head();
        for _ in 0..limit.max(1) {
            entries.push(format!(
                "height={} hash={} txs={}",
                cur.height,
                cur.hash,
                cur.block.transactions.len(),
            ));
            if cur.is_genesis() {
                break;
            }
            cur = cur.parent_or_self();
        }
        entries.join("; ")
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Drive the node until shutdown is requested, then wind the actors
    /// down.
    pub fn run(&self) {
        info!("node driver running");
        while !self.is_shutdown() {
            self.drive_once();
            std::thread::sleep(DRIVE_INTERVAL);
        }
        info!("node driver stopping");

        if self.miner.is_running() {
            let _ = self.miner.stop();
        }
        if let Some(peer) = &self.peer {
            peer.shutdown();
        }
    }

    /// A single driver iteration; exposed for tests.
    pub fn drive_once(&self) {
        if let Some(peer) = &self.peer {
            for block in peer.take_incoming_blocks() {
                self.tree.add_block(block);
            }
            for tx in peer.take_incoming_transactions() {
                if let Err(err) = self.mempool.add_transaction(tx) {
                    debug!(%err, "peer transaction rejected");
                }
            }
        }

        while let Some(block) = self.miner.get_mined_block() {
            if let Some(peer) = &self.peer {
                peer.broadcast_block(&block);
            }
            self.tree.add_block(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::genesis::genesis_hash;

    use std::time::Instant;
    use tempfile::tempdir;

    fn test_node() -> (tempfile::TempDir, Arc<Node>) {
        let dir = tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            ..NodeConfig::default()
        };
        let node = Node::new(config).unwrap();
        (dir, node)
    }

    #[test]
    fn new_node_starts_at_genesis() {
        let (_dir, node) = test_node();
        assert_eq!(node.tree.head().hash, genesis_hash());
        assert!(node.mempool.is_empty());
        assert!(!node.miner.is_running());
        assert!(node.peer.is_none());
    }

    #[test]
    fn wallet_file_created() {
        let (dir, node) = test_node();
        assert!(dir.path().join("wallet").exists());
        let _ = node;
    }

    #[test]
    fn tip_summary_lists_genesis() {
        let (_dir, node) = test_node();
        let summary = node.tip_summary(3);
        assert!(summary.contains("height=0"));
        assert!(summary.contains("txs=0"));
    }

    #[test]
    fn mined_blocks_flow_into_tree() {
        let (_dir, node) = test_node();
        node.miner.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while node.tree.head().height == 0 {
            node.drive_once();
            assert!(Instant::now() < deadline, "no block mined in time");
            std::thread::sleep(Duration::from_millis(10));
        }
        node.miner.stop().unwrap();

        // The coinbase of the mined block pays the wallet.
        let head = node.tree.head();
        assert!(head.height >= 1);
        let wallet = node.wallet.lock();
        assert!(wallet.balance_with_confirmations(None, 0) > 0);
    }

    #[test]
    fn end_to_end_send_and_confirm() {
        let (_dir, node) = test_node();

        // Mine until the wallet holds a spendable output.
        node.miner.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while node.tree.head().height < 1 {
            node.drive_once();
            assert!(Instant::now() < deadline, "mining stalled");
            std::thread::sleep(Duration::from_millis(10));
        }

        // Build and submit a payment; the mempool accepts it and a
        // later block confirms it.
        let to = cinder_core::types::PublicKey([0xCD; 32]);
        let tx = node.wallet.lock().send(to, 400).unwrap();
        let txid = node.submit_transaction(tx).unwrap();
        assert!(node.mempool.contains(&txid));

        let deadline = Instant::now() + Duration::from_secs(10);
        while node.mempool.contains(&txid) {
            node.drive_once();
            assert!(Instant::now() < deadline, "transaction never confirmed");
            std::thread::sleep(Duration::from_millis(10));
        }
        node.miner.stop().unwrap();

        // The receiver's output is in the UTXO set.
        let snapshot = node.tree.utxo_snapshot();
        let paid: u64 = snapshot
            .iter()
            .filter(|(_, utxo)| utxo.output.pubkey == to)
            .map(|(_, utxo)| utxo.output.amount)
            .sum();
        assert_eq!(paid, 400);
    }

    #[test]
    fn shutdown_flag() {
        let (_dir, node) = test_node();
        assert!(!node.is_shutdown());
        node.request_shutdown();
        assert!(node.is_shutdown());
    }
}
