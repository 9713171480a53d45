//! # cinder-wallet
//! On-disk key storage and transaction building.

pub mod error;
pub mod keystore;
pub mod wallet;

pub use error::WalletError;
pub use keystore::KeyStore;
pub use wallet::{Wallet, DEFAULT_FEE, MIN_CONFIRMATIONS};
