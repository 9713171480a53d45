//! Balance tracking and transaction building over a [`KeyStore`].
//!
//! The wallet scans a snapshot of the authoritative UTXO set for
//! outputs paying any of its keys. Balance queries take a confirmation
//! threshold derived from the height stored on each UTXO; spending is
//! allowed regardless of depth, matching how the node itself treats
//! outputs.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use cinder_core::chain::BlockTree;
use cinder_core::types::{Input, OutPoint, Output, PublicKey, Signature, Transaction};

use crate::error::WalletError;
use crate::keystore::KeyStore;

/// Default fee attached to wallet-built transactions.
pub const DEFAULT_FEE: u64 = 100;

/// Confirmations required before an output counts toward the default
/// balance query.
pub const MIN_CONFIRMATIONS: u64 = 10;

/// An output owned by one of the wallet's keys.
#[derive(Clone, Debug)]
struct OwnedUtxo {
    outpoint: OutPoint,
    amount: u64,
    pubkey: PublicKey,
    height: u64,
}

/// A spending wallet bound to a key file and a block tree.
pub struct Wallet {
    keystore: KeyStore,
    tree: Arc<BlockTree>,
}

impl Wallet {
    /// Open (or create) the key file and bind the wallet to `tree`.
    pub fn open(path: impl Into<PathBuf>, tree: Arc<BlockTree>) -> Result<Self, WalletError> {
        Ok(Self { keystore: KeyStore::open(path)?, tree })
    }

    pub fn new_address(&mut self) -> Result<PublicKey, WalletError> {
        self.keystore.new_address()
    }

    pub fn addresses(&self) -> Vec<PublicKey> {
        self.keystore.addresses()
    }

    pub fn default_address(&self) -> PublicKey {
        self.keystore.default_address()
    }

    /// Collect every UTXO paying one of the wallet's keys.
    fn owned_utxos(&self) -> Vec<OwnedUtxo> {
        let addresses = self.keystore.addresses();
        let snapshot = self.tree.utxo_snapshot();
        let mut owned: Vec<OwnedUtxo> = snapshot
            .iter()
            .filter(|(_, utxo)| addresses.contains(&utxo.output.pubkey))
            .map(|(outpoint, utxo)| OwnedUtxo {
                outpoint: *outpoint,
                amount: utxo.output.amount,
                pubkey: utxo.output.pubkey,
                height: utxo.height,
            })
            .collect();
        // Deterministic selection order.
        owned.sort_by_key(|u| u.outpoint);
        owned
    }

    /// Balance with the default confirmation threshold, for one address
    /// or for the whole wallet.
    pub fn balance(&self, address: Option<&PublicKey>) -> u64 {
        self.balance_with_confirmations(address, MIN_CONFIRMATIONS)
    }

    /// Balance counting only outputs at least `min_conf` blocks deep.
    pub fn balance_with_confirmations(
        &self,
        address: Option<&PublicKey>,
        min_conf: u64,
    ) -> u64 {
        let head_height = self.tree.head().height;
        self.owned_utxos()
            .iter()
            .filter(|u| address.is_none_or(|a| u.pubkey == *a))
            .filter(|u| u.height.saturating_add(min_conf) <= head_height)
            .map(|u| u.amount)
            .sum()
    }

    /// Build and sign a transaction paying `receivers`, spending the
    /// wallet's outputs greedily and returning change to a fresh
    /// address.
    pub fn create_transaction(
        &mut self,
        receivers: &[(PublicKey, u64)],
        fee: u64,
    ) -> Result<Transaction, WalletError> {
        let mut needed = fee;
        let mut outputs = Vec::with_capacity(receivers.len() + 1);
        for (pubkey, amount) in receivers {
            outputs.push(Output { amount: *amount, pubkey: *pubkey });
            needed = needed.saturating_add(*amount);
        }

        // Greedy selection until the inputs cover amounts plus fee.
        let owned = self.owned_utxos();
        let mut inputs = Vec::new();
        let mut input_keys = Vec::new();
        let mut gathered: u64 = 0;
        for utxo in &owned {
            if gathered >= needed {
                break;
            }
            inputs.push(Input { prev: utxo.outpoint, signature: Signature::ZERO });
            input_keys.push(utxo.pubkey);
            gathered = gathered.saturating_add(utxo.amount);
        }

        if gathered < needed {
            let have: u64 = owned.iter().map(|u| u.amount).sum();
            return Err(WalletError::NotEnoughFunds { have, need: needed });
        }

        let change = gathered - needed;
        if change > 0 {
            outputs.push(Output { amount: change, pubkey: self.new_address()? });
        }

        let mut tx = Transaction { inputs, outputs };

        // Every input signs the txid of the signature-stripped form.
        let txid = tx.txid();
        for (index, pubkey) in input_keys.iter().enumerate() {
            let key = self
                .keystore
                .lookup(pubkey)
                .ok_or_else(|| WalletError::UnknownAddress(pubkey.to_string()))?;
            tx.inputs[index].signature = key.sign(txid.as_bytes());
        }

        debug!(tx = %txid, inputs = tx.inputs.len(), outputs = tx.outputs.len(), "built transaction");
        Ok(tx)
    }

    /// Pay a single receiver with the default fee.
    pub fn send(&mut self, to: PublicKey, amount: u64) -> Result<Transaction, WalletError> {
        self.create_transaction(&[(to, amount)], DEFAULT_FEE)
    }
}
