//! Node-level error types.
use thiserror::Error;

use cinder_core::error::CodecError;
use cinder_wallet::WalletError;

/// Fatal errors while assembling or running a node.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("configuration: {0}")] Config(#[from] config::ConfigError),
    #[error("wallet: {0}")] Wallet(#[from] WalletError),
    #[error("i/o: {0}")] Io(#[from] std::io::Error),
}

/// Protocol violations on the peer connection. Any of these closes the
/// connection.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("frame of {0} bytes exceeds the limit")] FrameTooLarge(usize),
    #[error("frame too short for a tag")] Truncated,
    #[error("unknown frame tag {0:?}")] UnknownTag([u8; 3]),
    #[error("bad frame payload: {0}")] Codec(#[from] CodecError),
    #[error("peer i/o: {0}")] Io(#[from] std::io::Error),
}
