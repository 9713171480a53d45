//! Concurrent proof-of-work miner.
//!
//! The mining thread spins over fixed-size nonce batches and never
//! parks: between batches it polls two cooperative flags. A writer
//! publishes the candidate and then sets `retarget`; the reader clears
//! `retarget` and then reads the candidate, so the reader wastes at
//! most one batch of work before switching targets.
//!
//! Candidates are rebuilt on construction, on every head change and on
//! every mempool admission: all pooled transactions behind a coinbase
//! paying the block reward plus the pool's total fees. The coinbase
//! input index is drawn at random so coinbase txids never collide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::chain::BlockTree;
use crate::constants::MINING_BATCH_SIZE;
use crate::crypto::sha256d;
use crate::difficulty::next_difficulty;
use crate::error::MinerError;
use crate::mempool::Mempool;
use crate::reward::block_reward;
use crate::types::{
    Block, BlockHeader, Hash256, Input, OutPoint, Output, PublicKey, Signature, Transaction,
};
use crate::unix_time;
use crate::validation::hash_meets_difficulty;

/// Seconds to wait for the mining thread after signalling stop.
const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct Candidate {
    block: Block,
    height: u64,
}

struct MinerState {
    target: Option<Candidate>,
    solved: Option<Block>,
    hashrate: f64,
    reward_pubkey: PublicKey,
}

struct MinerShared {
    state: Mutex<MinerState>,
    stop: AtomicBool,
    retarget: AtomicBool,
}

/// Builds candidate blocks and searches their nonce space.
pub struct Miner {
    tree: Arc<BlockTree>,
    mempool: Arc<Mempool>,
    shared: Arc<MinerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Miner {
    /// Create a miner paying rewards to `reward_pubkey` and publish an
    /// initial candidate.
    pub fn new(tree: Arc<BlockTree>, mempool: Arc<Mempool>, reward_pubkey: PublicKey) -> Self {
        let miner = Self {
            tree,
            mempool,
            shared: Arc::new(MinerShared {
                state: Mutex::new(MinerState {
                    target: None,
                    solved: None,
                    hashrate: 0.0,
                    reward_pubkey,
                }),
                stop: AtomicBool::new(false),
                retarget: AtomicBool::new(false),
            }),
            thread: Mutex::new(None),
        };
        miner.retarget();
        miner
    }

    /// Rebuild the candidate block from the current head and mempool.
    ///
    /// Call on head changes and mempool admissions; the mining thread
    /// picks the new candidate up at its next flag check.
    pub fn retarget(&self) {
        let head = self.tree.head();
        let txs = self.mempool.transactions();
        let total_fees = self.mempool.total_fees();
        let height = head.height + 1;
        let reward = block_reward(height) + total_fees;

        let mut st = self.shared.state.lock();
        let coinbase = Transaction {
            inputs: vec![Input {
                prev: OutPoint::new(Hash256::ZERO, rand::random::<u32>()),
                signature: Signature::ZERO,
            }],
            outputs: vec![Output { amount: reward, pubkey: st.reward_pubkey }],
        };

        let mut transactions = vec![coinbase];
        transactions.extend(txs);
        let mut block = Block {
            header: BlockHeader {
                prev_hash: head.hash,
                merkle_root: Hash256::ZERO,
                timestamp: unix_time(),
                diff: next_difficulty(&head),
                nonce: 0,
            },
            transactions,
        };
        block.update_merkle_root();

        st.target = Some(Candidate { block, height });
        drop(st);
        self.shared.retarget.store(true, Ordering::SeqCst);
    }

    /// Redirect future rewards; takes effect at the next retarget.
    pub fn set_reward_pubkey(&self, pubkey: PublicKey) {
        self.shared.state.lock().reward_pubkey = pubkey;
    }

    /// Start the mining thread.
    pub fn start(&self) -> Result<(), MinerError> {
        let mut guard = self.thread.lock();
        if guard.is_some() {
            return Err(MinerError::AlreadyRunning);
        }
        info!("starting miner thread");

        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.retarget.store(false, Ordering::SeqCst);
        self.retarget();

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("miner".into())
            .spawn(move || mine_loop(shared))
            .map_err(|err| MinerError::Spawn(err.to_string()))?;
        *guard = Some(handle);
        Ok(())
    }

    /// Signal the mining thread to stop and wait up to the grace period.
    pub fn stop(&self) -> Result<(), MinerError> {
        let mut guard = self.thread.lock();
        let handle = guard.take().ok_or(MinerError::NotRunning)?;
        info!("stopping miner thread");

        self.shared.stop.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + STOP_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            error!("miner thread still running after {}s, giving up", STOP_GRACE.as_secs());
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Latest hashrate estimate in hashes per second.
    pub fn hashrate(&self) -> Result<f64, MinerError> {
        if !self.is_running() {
            return Err(MinerError::NotRunning);
        }
        Ok(self.shared.state.lock().hashrate)
    }

    /// Take the most recent solved block, if any. The outer driver
    /// polls this and submits solutions to the block tree and peer.
    pub fn get_mined_block(&self) -> Option<Block> {
        self.shared.state.lock().solved.take()
    }
}

fn mine_loop(shared: Arc<MinerShared>) {
    info!("miner thread running");
    let mut nonce: u64 = rand::random::<u32>() as u64;

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            return;
        }

        // Clear the retarget flag, then read the candidate published
        // before it was set.
        shared.retarget.store(false, Ordering::SeqCst);
        let Some(candidate) = shared.state.lock().target.clone() else {
            // Between a solution and the next retarget there is no
            // target; spin cooperatively.
            std::thread::yield_now();
            continue;
        };

        let diff = candidate.block.header.diff;
        let header = candidate.block.header.serialize();
        // The nonce occupies the trailing eight bytes of the header.
        let split = header.len() - 8;
        let mut data = header;
        debug!(height = candidate.height, diff, "new mining target");

        while !shared.retarget.load(Ordering::SeqCst) {
            let started = Instant::now();
            let mut hashes: u64 = 0;
            let mut found = None;

            for _ in 0..MINING_BATCH_SIZE {
                data[split..].copy_from_slice(&nonce.to_be_bytes());
                hashes += 1;
                if hash_meets_difficulty(&sha256d(&data), diff) {
                    found = Some(nonce);
                    break;
                }
                nonce = nonce.wrapping_add(1);
            }

            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            shared.state.lock().hashrate = hashes as f64 / elapsed;

            if let Some(nonce) = found {
                let mut solved = candidate.block.clone();
                solved.header.nonce = nonce;
                info!(block = %solved.hash(), height = candidate.height, "found a block");
                let mut st = shared.state.lock();
                st.solved = Some(solved);
                st.target = None;
                drop(st);
                shared.retarget.store(true, Ordering::SeqCst);
                break;
            }

            if shared.stop.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AddOutcome;
    use crate::constants::INITIAL_REWARD;
    use crate::crypto::KeyPair;

    use std::time::Duration;

    fn pk(seed: u8) -> PublicKey {
        PublicKey([seed; 32])
    }

    fn setup() -> (Arc<BlockTree>, Arc<Mempool>, Miner) {
        let tree = Arc::new(BlockTree::new());
        let mempool = Arc::new(Mempool::new(Arc::clone(&tree)));
        let miner = Miner::new(Arc::clone(&tree), Arc::clone(&mempool), pk(0x33));
        (tree, mempool, miner)
    }

    /// Poll the miner for a solution for up to five seconds.
    fn wait_for_block(miner: &Miner) -> Block {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(block) = miner.get_mined_block() {
                return block;
            }
            assert!(Instant::now() < deadline, "miner found no block in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn candidate_built_on_construction() {
        let (_, _, miner) = setup();
        let st = miner.shared.state.lock();
        let candidate = st.target.as_ref().unwrap();
        assert_eq!(candidate.height, 1);
        assert_eq!(candidate.block.header.diff, 1);
        assert_eq!(candidate.block.transactions.len(), 1);
        assert!(candidate.block.transactions[0].is_coinbase());
        assert_eq!(candidate.block.transactions[0].outputs[0].amount, INITIAL_REWARD);
        assert_eq!(
            candidate.block.header.merkle_root,
            candidate.block.compute_merkle_root()
        );
    }

    #[test]
    fn candidate_includes_mempool_and_fees() {
        let key = KeyPair::from_seed([1; 32]);
        let tree = Arc::new(BlockTree::new());

        // Fund the key at height 1.
        let cb = Transaction {
            inputs: vec![Input {
                prev: OutPoint::new(Hash256::ZERO, 1),
                signature: Signature::ZERO,
            }],
            outputs: vec![Output { amount: INITIAL_REWARD, pubkey: key.public_key() }],
        };
        let funding = OutPoint::new(cb.txid(), 0);
        let mut block = Block {
            header: BlockHeader {
                prev_hash: tree.head().hash,
                merkle_root: Hash256::ZERO,
                timestamp: 1,
                diff: 1,
                nonce: 0,
            },
            transactions: vec![cb],
        };
        block.update_merkle_root();
        while !hash_meets_difficulty(&block.hash(), 1) {
            block.header.nonce += 1;
        }
        assert!(matches!(tree.add_block(block), AddOutcome::Added { .. }));

        let mempool = Arc::new(Mempool::new(Arc::clone(&tree)));
        let mut tx = Transaction {
            inputs: vec![Input { prev: funding, signature: Signature::ZERO }],
            outputs: vec![Output { amount: 900, pubkey: pk(2) }],
        };
        let txid = tx.txid();
        tx.inputs[0].signature = key.sign(txid.as_bytes());
        mempool.add_transaction(tx.clone()).unwrap();

        let miner = Miner::new(Arc::clone(&tree), Arc::clone(&mempool), pk(0x33));
        let st = miner.shared.state.lock();
        let candidate = st.target.as_ref().unwrap();
        assert_eq!(candidate.height, 2);
        assert_eq!(candidate.block.transactions.len(), 2);
        // Coinbase first, paying reward plus the collected fee.
        assert!(candidate.block.transactions[0].is_coinbase());
        assert_eq!(
            candidate.block.transactions[0].outputs[0].amount,
            INITIAL_REWARD + 100
        );
        assert_eq!(candidate.block.transactions[1], tx);
    }

    #[test]
    fn coinbase_index_randomised() {
        let (_, _, miner) = setup();
        let first = {
            let st = miner.shared.state.lock();
            st.target.as_ref().unwrap().block.transactions[0].inputs[0].prev.index
        };
        let mut seen_different = false;
        for _ in 0..16 {
            miner.retarget();
            let st = miner.shared.state.lock();
            let index =
                st.target.as_ref().unwrap().block.transactions[0].inputs[0].prev.index;
            if index != first {
                seen_different = true;
                break;
            }
        }
        assert!(seen_different, "coinbase index never changed across retargets");
    }

    #[test]
    fn start_twice_errors() {
        let (_, _, miner) = setup();
        miner.start().unwrap();
        assert_eq!(miner.start(), Err(MinerError::AlreadyRunning));
        miner.stop().unwrap();
    }

    #[test]
    fn stop_idle_errors() {
        let (_, _, miner) = setup();
        assert_eq!(miner.stop(), Err(MinerError::NotRunning));
        assert_eq!(miner.hashrate(), Err(MinerError::NotRunning));
    }

    #[test]
    fn mines_a_valid_block() {
        let (tree, _, miner) = setup();
        miner.start().unwrap();
        let block = wait_for_block(&miner);
        miner.stop().unwrap();

        assert!(hash_meets_difficulty(&block.hash(), block.header.diff));
        assert!(matches!(
            tree.add_block(block),
            AddOutcome::Added { new_head: true, .. }
        ));
        assert_eq!(tree.head().height, 1);
    }

    #[test]
    fn solution_slot_drains_once() {
        let (_, _, miner) = setup();
        miner.start().unwrap();
        let _ = wait_for_block(&miner);
        // The slot is empty until another candidate is solved; after
        // stop no new candidate is produced.
        miner.stop().unwrap();
        assert!(miner.get_mined_block().is_none());
    }

    #[test]
    fn restart_after_stop() {
        let (tree, _, miner) = setup();
        miner.start().unwrap();
        let first = wait_for_block(&miner);
        miner.stop().unwrap();
        assert!(matches!(tree.add_block(first), AddOutcome::Added { .. }));

        miner.retarget();
        miner.start().unwrap();
        let second = wait_for_block(&miner);
        miner.stop().unwrap();
        assert_eq!(second.header.prev_hash, tree.head().hash);
    }

    #[test]
    fn hashrate_reported_while_running() {
        let (_, _, miner) = setup();
        miner.start().unwrap();
        // Difficulty 1 solves almost immediately; the estimate may still
        // be the initial zero if no full batch has elapsed.
        let rate = miner.hashrate().unwrap();
        assert!(rate >= 0.0);
        miner.stop().unwrap();
    }

    #[test]
    fn retarget_publishes_target_before_flag() {
        let (tree, _, miner) = setup();
        // After any retarget the flag is raised and a candidate for the
        // current head is present.
        miner.retarget();
        assert!(miner.shared.retarget.load(Ordering::SeqCst));
        let st = miner.shared.state.lock();
        let candidate = st.target.as_ref().unwrap();
        assert_eq!(candidate.block.header.prev_hash, tree.head().hash);
    }

    #[test]
    fn reward_pubkey_change_applies_on_next_retarget() {
        let (_, _, miner) = setup();
        miner.set_reward_pubkey(pk(0x44));
        miner.retarget();
        let st = miner.shared.state.lock();
        let candidate = st.target.as_ref().unwrap();
        assert_eq!(candidate.block.transactions[0].outputs[0].pubkey, pk(0x44));
    }
}
