//! Wallet error types.
use thiserror::Error;

use cinder_core::error::CryptoError;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("not enough funds: have {have}, need {need}")] NotEnoughFunds { have: u64, need: u64 },
    #[error("no key for address {0}")] UnknownAddress(String),
    #[error("malformed wallet file at line {line}")] MalformedKeyFile { line: usize },
    #[error("invalid key material at line {line}: {source}")] InvalidKey { line: usize, source: CryptoError },
    #[error(transparent)] Io(#[from] std::io::Error),
}
