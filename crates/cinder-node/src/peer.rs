//! Two-peer framed transport.
//!
//! Frames are a u32 big-endian length followed by a payload beginning
//! with a three-byte tag: `BLK` (serialized block), `TXN` (serialized
//! transaction) or `REQ` (32-byte block hash; answered with a `BLK`
//! frame). One dedicated thread owns the socket, draining the outbound
//! queues and polling the socket with a short read timeout; it never
//! blocks indefinitely. A malformed frame closes the connection.
//!
//! The transport only moves bytes: the node driver drains the inbound
//! queues into the block tree and mempool.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use cinder_core::chain::BlockTree;
use cinder_core::codec::Reader;
use cinder_core::types::{Block, Hash256, Transaction};

use crate::config::PeerConfig;
use crate::error::PeerError;

const TAG_BLOCK: &[u8; 3] = b"BLK";
const TAG_TX: &[u8; 3] = b"TXN";
const TAG_REQUEST: &[u8; 3] = b"REQ";

/// Upper bound on a single frame; anything larger is a protocol
/// violation.
const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Socket poll interval; bounds shutdown and send latency.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Seconds to wait for the transport thread after signalling stop.
const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Queues {
    out_blocks: Vec<Block>,
    out_txs: Vec<Transaction>,
    in_blocks: Vec<Block>,
    in_txs: Vec<Transaction>,
}

struct PeerShared {
    queues: Mutex<Queues>,
    stop: AtomicBool,
}

/// Handle to the transport thread and its queues.
pub struct Peer {
    shared: Arc<PeerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    /// Spawn the transport thread. Connection failures are fatal to the
    /// transport actor, not to the process.
    pub fn spawn(config: PeerConfig, tree: Arc<BlockTree>) -> std::io::Result<Arc<Self>> {
        let shared = Arc::new(PeerShared {
            queues: Mutex::new(Queues::default()),
            stop: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("peer".into())
            .spawn(move || net_main(thread_shared, tree, config))?;
        Ok(Arc::new(Self { shared, thread: Mutex::new(Some(handle)) }))
    }

    /// Queue a block for the peer.
    pub fn broadcast_block(&self, block: &Block) {
        self.shared.queues.lock().out_blocks.push(block.clone());
    }

    /// Queue a transaction for the peer.
    pub fn broadcast_transaction(&self, tx: &Transaction) {
        self.shared.queues.lock().out_txs.push(tx.clone());
    }

    /// Drain blocks received from the peer.
    pub fn take_incoming_blocks(&self) -> Vec<Block> {
        std::mem::take(&mut self.shared.queues.lock().in_blocks)
    }

    /// Drain transactions received from the peer.
    pub fn take_incoming_transactions(&self) -> Vec<Transaction> {
        std::mem::take(&mut self.shared.queues.lock().in_txs)
    }

    /// Signal the transport thread to stop and wait up to the grace
    /// period.
    pub fn shutdown(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        info!("stopping peer thread");
        self.shared.stop.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + STOP_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            error!("peer thread still running after {}s, giving up", STOP_GRACE.as_secs());
        }
    }
}

fn net_main(shared: Arc<PeerShared>, tree: Arc<BlockTree>, config: PeerConfig) {
    let mut stream = match establish(&shared, &config) {
        Ok(Some(stream)) => stream,
        Ok(None) => return, // stopped while waiting
        Err(err) => {
            error!(%err, "peer transport failed to start");
            return;
        }
    };
    if let Err(err) = stream.set_read_timeout(Some(POLL_TIMEOUT)) {
        error!(%err, "peer socket configuration failed");
        return;
    }

    let mut recv_buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 64 * 1024];

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            return;
        }

        // Outbound queues first.
        let (blocks, txs) = {
            let mut queues = shared.queues.lock();
            (std::mem::take(&mut queues.out_blocks), std::mem::take(&mut queues.out_txs))
        };
        for block in blocks {
            if let Err(err) = write_frame(&mut stream, TAG_BLOCK, &block.serialize()) {
                error!(%err, "peer send failed");
                return;
            }
        }
        for tx in txs {
            if let Err(err) = write_frame(&mut stream, TAG_TX, &tx.serialize()) {
                error!(%err, "peer send failed");
                return;
            }
        }

        // Poll the socket; the read timeout paces the loop.
        match stream.read(&mut chunk) {
            Ok(0) => {
                info!("peer disconnected");
                return;
            }
            Ok(n) => recv_buf.extend_from_slice(&chunk[..n]),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => {
                error!(%err, "peer read failed");
                return;
            }
        }

        // Extract complete frames.
        if let Err(err) = drain_frames(&mut recv_buf, &shared, &tree, &mut stream) {
            warn!(%err, "malformed frame from peer, closing connection");
            return;
        }
    }
}

/// Process every complete frame buffered in `recv_buf`, leaving any
/// trailing partial frame in place.
fn drain_frames(
    recv_buf: &mut Vec<u8>,
    shared: &PeerShared,
    tree: &BlockTree,
    stream: &mut TcpStream,
) -> Result<(), PeerError> {
    loop {
        if recv_buf.len() < 4 {
            return Ok(());
        }
        let len =
            u32::from_be_bytes([recv_buf[0], recv_buf[1], recv_buf[2], recv_buf[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(PeerError::FrameTooLarge(len));
        }
        if recv_buf.len() < 4 + len {
            return Ok(());
        }
        let payload: Vec<u8> = recv_buf[4..4 + len].to_vec();
        recv_buf.drain(..4 + len);

        handle_frame(&payload, shared, tree, stream)?;
    }
}

/// Accept or dial the single peer. Returns `None` if stopped while
/// listening.
fn establish(shared: &PeerShared, config: &PeerConfig) -> std::io::Result<Option<TcpStream>> {
    if config.listen {
        let listener = TcpListener::bind((config.host.as_str(), config.port))?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "waiting for peer");
        loop {
            if shared.stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match listener.accept() {
                Ok((stream, addr)) => {
                    info!(%addr, "peer connected");
                    stream.set_nonblocking(false)?;
                    return Ok(Some(stream));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_TIMEOUT);
                }
                Err(err) => return Err(err),
            }
        }
    } else {
        let stream = TcpStream::connect((config.host.as_str(), config.port))?;
        info!(addr = %stream.peer_addr()?, "connected to peer");
        Ok(Some(stream))
    }
}

fn write_frame(stream: &mut TcpStream, tag: &[u8; 3], body: &[u8]) -> std::io::Result<()> {
    let len = (tag.len() + body.len()) as u32;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(tag)?;
    stream.write_all(body)
}

fn handle_frame(
    payload: &[u8],
    shared: &PeerShared,
    tree: &BlockTree,
    stream: &mut TcpStream,
) -> Result<(), PeerError> {
    if payload.len() < 3 {
        return Err(PeerError::Truncated);
    }
    let (tag, body) = payload.split_at(3);
    match tag {
        _ if tag == TAG_BLOCK => {
            let block = Block::decode(&mut Reader::new(body))?;
            debug!(block = %block.hash(), "received block");
            shared.queues.lock().in_blocks.push(block);
            Ok(())
        }
        _ if tag == TAG_TX => {
            let tx = Transaction::decode(&mut Reader::new(body))?;
            debug!(tx = %tx.txid(), "received transaction");
            shared.queues.lock().in_txs.push(tx);
            Ok(())
        }
        _ if tag == TAG_REQUEST => {
            let hash = Hash256(Reader::new(body).read_array()?);
            match tree.get(&hash) {
                Some(linked) => {
                    debug!(block = %hash, "serving requested block");
                    write_frame(stream, TAG_BLOCK, &linked.block.serialize())?;
                }
                None => warn!(block = %hash, "peer requested unknown block"),
            }
            Ok(())
        }
        _ => {
            let mut bad = [0u8; 3];
            bad.copy_from_slice(tag);
            Err(PeerError::UnknownTag(bad))
        }
    }
}
