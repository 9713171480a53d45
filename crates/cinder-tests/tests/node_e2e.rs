//! Two full nodes over the peer transport: blocks and transactions
//! mined on one node propagate to the other.

use std::net::TcpListener;
use std::time::{Duration, Instant};

use cinder_node_lib::config::PeerConfig;
use cinder_node_lib::{Node, NodeConfig};

fn free_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

fn node_config(dir: &tempfile::TempDir, peer: PeerConfig) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        peer,
        ..NodeConfig::default()
    }
}

/// Drive both nodes until `done` holds or the deadline passes.
fn drive_until(a: &Node, b: &Node, what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(15);
    while !done() {
        a.drive_once();
        b.drive_once();
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn blocks_and_transactions_propagate_between_nodes() {
    let port = free_port();
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let node_a = Node::new(node_config(
        &dir_a,
        PeerConfig { enabled: true, listen: true, host: "127.0.0.1".into(), port },
    ))
    .unwrap();
    // Let the listener come up before dialing.
    std::thread::sleep(Duration::from_millis(200));
    let node_b = Node::new(node_config(
        &dir_b,
        PeerConfig { enabled: true, listen: false, host: "127.0.0.1".into(), port },
    ))
    .unwrap();
    // Let the connection establish before blocks start flowing.
    std::thread::sleep(Duration::from_millis(300));

    // Node A mines; node B follows its chain.
    node_a.miner.start().unwrap();
    drive_until(&node_a, &node_b, "initial sync", || {
        node_b.tree.head().height >= 1
    });
    node_a.miner.stop().unwrap();
    drive_until(&node_a, &node_b, "head convergence", || {
        node_b.tree.head().hash == node_a.tree.head().hash
    });

    // A pays B; the transaction reaches B's mempool over the wire.
    let to = node_b.wallet.lock().default_address();
    let tx = node_a.wallet.lock().send(to, 400).unwrap();
    let txid = node_a.submit_transaction(tx).unwrap();
    drive_until(&node_a, &node_b, "transaction relay", || {
        node_b.mempool.contains(&txid)
    });

    // More mining confirms the payment on both sides.
    node_a.miner.start().unwrap();
    drive_until(&node_a, &node_b, "confirmation", || {
        !node_a.mempool.contains(&txid) && !node_b.mempool.contains(&txid)
    });
    node_a.miner.stop().unwrap();
    drive_until(&node_a, &node_b, "final convergence", || {
        node_b.tree.head().hash == node_a.tree.head().hash
    });

    let received: u64 = node_b
        .tree
        .utxo_snapshot()
        .iter()
        .filter(|(_, utxo)| utxo.output.pubkey == to)
        .map(|(_, utxo)| utxo.output.amount)
        .sum();
    assert_eq!(received, 400);

    // Wind the transports down.
    if let Some(peer) = &node_a.peer {
        peer.shutdown();
    }
    if let Some(peer) = &node_b.peer {
        peer.shutdown();
    }
}
