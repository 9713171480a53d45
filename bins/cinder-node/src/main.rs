//! Cinder full node binary.
//!
//! Starts the block tree, mempool, miner, wallet, operator socket and
//! (optionally) the two-peer transport, then drives them until an
//! operator issues `shutdown`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};

use cinder_core::constants::{DEFAULT_CONTROL_PORT, DEFAULT_PEER_PORT};
use cinder_node_lib::{config::PeerConfig, control, Node, NodeConfig, NodeError};

/// Cinder node — a minimal proof-of-work cryptocurrency.
#[derive(Parser, Debug)]
#[command(name = "cinder-node", version, about = "Cinder full node")]
struct Args {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the wallet and node state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Listen for the peer instead of dialing out
    #[arg(long)]
    listen: bool,

    /// Peer address to listen on or connect to
    #[arg(long)]
    peer_host: Option<String>,

    /// Peer port
    #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
    peer_port: u16,

    /// Disable the peer transport (single-node mode)
    #[arg(long)]
    no_peer: bool,

    /// Operator interface port
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Start mining to the wallet's first address immediately
    #[arg(long)]
    mine: bool,
}

impl Args {
    fn into_config(self) -> Result<(NodeConfig, String, bool), NodeError> {
        let mut cfg = NodeConfig::load(self.config.as_deref()).map_err(NodeError::from)?;

        if let Some(data_dir) = self.data_dir {
            cfg.data_dir = data_dir;
        }
        if let Some(host) = self.peer_host {
            cfg.peer = PeerConfig {
                enabled: true,
                listen: self.listen,
                host,
                port: self.peer_port,
            };
        } else if self.listen {
            cfg.peer.enabled = true;
            cfg.peer.listen = true;
            cfg.peer.port = self.peer_port;
        }
        if self.no_peer {
            cfg.peer.enabled = false;
        }
        cfg.control_port = self.control_port;
        cfg.log_level = self.log_level;

        Ok((cfg, self.log_format, self.mine))
    }
}

fn main() {
    let args = Args::parse();
    let (config, log_format, mine) = match args.into_config() {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("bad configuration: {err}");
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("Cinder node v{}", env!("CARGO_PKG_VERSION"));
    info!(data_dir = %config.data_dir.display(), "starting");
    info!(control = %config.control_addr(), peer_enabled = config.peer.enabled, "endpoints");

    let node = match Node::new(config) {
        Ok(node) => node,
        Err(err) => {
            error!(%err, "failed to start node");
            process::exit(1);
        }
    };

    if let Err(err) = control::spawn(std::sync::Arc::clone(&node)) {
        error!(%err, "failed to start operator interface");
        process::exit(1);
    }

    if mine {
        match node.miner.start() {
            Ok(()) => info!("mining started"),
            Err(err) => error!(%err, "failed to start miner"),
        }
    }

    node.run();
    info!("Cinder node shutdown complete");
}

/// Initialize the tracing subscriber with the given level filter and
/// output format. "json" selects structured output for log pipelines.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
