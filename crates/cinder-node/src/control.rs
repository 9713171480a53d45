//! Line-oriented operator interface.
//!
//! One command per line over a local TCP socket. Expected failures
//! (insufficient funds, miner state, rejected transactions) come back
//! as a one-line `error:` message; unexpected failures dump the full
//! error chain to the socket as a debugging affordance.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use tracing::{debug, error, info};

use cinder_core::error::MinerError;
use cinder_core::types::PublicKey;
use cinder_wallet::WalletError;

use crate::node::Node;

/// Bind the operator socket and serve connections on a dedicated
/// thread. The accept loop blocks; it winds down after a `shutdown`
/// command once the current connection closes.
pub fn spawn(node: Arc<Node>) -> std::io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(node.config.control_addr())?;
    info!(addr = %listener.local_addr()?, "operator interface listening");

    std::thread::Builder::new().name("control".into()).spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => {
                    if let Err(err) = serve(stream, &node) {
                        debug!(%err, "operator connection ended");
                    }
                }
                Err(err) => {
                    error!(%err, "operator accept failed");
                    return;
                }
            }
            if node.is_shutdown() {
                return;
            }
        }
    })
}

fn serve(stream: TcpStream, node: &Arc<Node>) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        match dispatch(node, command) {
            Ok(reply) => writeln!(writer, "{reply}")?,
            // Unexpected failures dump the whole error report.
            Err(err) => writeln!(writer, "error: {err:?}")?,
        }
        writer.flush()?;
        if node.is_shutdown() {
            return Ok(());
        }
    }
}

/// Execute one operator command, producing the reply line.
fn dispatch(node: &Arc<Node>, line: &str) -> anyhow::Result<String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    match command {
        "send" => {
            let address = parse_pubkey(parts.next().context("usage: send <address> <amount>")?)?;
            let amount: u64 = parts
                .next()
                .context("usage: send <address> <amount>")?
                .parse()
                .context("amount must be an integer")?;
            let tx = match node.wallet.lock().send(address, amount) {
                Ok(tx) => tx,
                Err(err @ WalletError::NotEnoughFunds { .. }) => {
                    return Ok(format!("error: {err}"));
                }
                Err(err) => return Err(err.into()),
            };
            match node.submit_transaction(tx) {
                Ok(txid) => Ok(format!("sent {txid}")),
                Err(err) => Ok(format!("error: {err}")),
            }
        }
        "newaddress" => Ok(node.wallet.lock().new_address()?.to_string()),
        "balance" => {
            let address = parts.next().map(parse_pubkey).transpose()?;
            Ok(node.wallet.lock().balance(address.as_ref()).to_string())
        }
        "mine" => {
            let address = match parts.next() {
                Some(hex) => parse_pubkey(hex)?,
                None => node.wallet.lock().default_address(),
            };
            node.miner.set_reward_pubkey(address);
            match node.miner.start() {
                Ok(()) => Ok(format!("mining to {address}")),
                Err(err @ MinerError::AlreadyRunning) => Ok(format!("error: {err}")),
                Err(err) => Err(err.into()),
            }
        }
        "stopmining" => match node.miner.stop() {
            Ok(()) => Ok("mining stopped".to_string()),
            Err(err) => Ok(format!("error: {err}")),
        },
        "hashrate" => match node.miner.hashrate() {
            Ok(rate) => Ok(format!("{rate:.0} h/s")),
            Err(err) => Ok(format!("error: {err}")),
        },
        "tip" => {
            let limit: usize = parts.next().map(str::parse).transpose()?.unwrap_or(1);
            Ok(node.tip_summary(limit))
        }
        "shutdown" => {
            node.request_shutdown();
            Ok("shutting down".to_string())
        }
        other => Ok(format!("unknown command: {other}")),
    }
}

fn parse_pubkey(hex_str: &str) -> anyhow::Result<PublicKey> {
    let bytes = hex::decode(hex_str).context("address must be hex")?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("address must be 32 hex-encoded bytes"))?;
    Ok(PublicKey(bytes))
}
