//! On-disk key storage.
//!
//! One key per line: `hex(priv_key):hex(pub_key)\n`, where the private
//! key is the 64-byte Ed25519 seed-plus-public form. Opening a missing
//! file creates it with a single fresh key, so a node always has an
//! address to mine to.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use cinder_core::crypto::{KeyPair, PRIVKEY_LEN};
use cinder_core::types::PublicKey;

use crate::error::WalletError;

/// The key directory: every keypair the wallet controls, resolvable by
/// public key.
pub struct KeyStore {
    path: PathBuf,
    keys: Vec<KeyPair>,
}

impl KeyStore {
    /// Load the key file at `path`, creating it with one fresh key if
    /// it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let path = path.into();
        if path.exists() {
            let keys = Self::parse(&fs::read_to_string(&path)?)?;
            Ok(Self { path, keys })
        } else {
            let mut store = Self { path, keys: Vec::new() };
            store.keys.push(KeyPair::generate());
            store.save()?;
            Ok(store)
        }
    }

    fn parse(contents: &str) -> Result<Vec<KeyPair>, WalletError> {
        let mut keys = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line_no = idx + 1;
            if line.is_empty() {
                continue;
            }
            let (priv_hex, pub_hex) = line
                .split_once(':')
                .ok_or(WalletError::MalformedKeyFile { line: line_no })?;
            let priv_bytes = Zeroizing::new(
                hex::decode(priv_hex)
                    .map_err(|_| WalletError::MalformedKeyFile { line: line_no })?,
            );
            let priv_bytes: &[u8; PRIVKEY_LEN] = priv_bytes
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::MalformedKeyFile { line: line_no })?;
            let key = KeyPair::from_keypair_bytes(priv_bytes)
                .map_err(|source| WalletError::InvalidKey { line: line_no, source })?;

            // The stored public half must agree with the private key.
            let pub_bytes = hex::decode(pub_hex)
                .map_err(|_| WalletError::MalformedKeyFile { line: line_no })?;
            if pub_bytes != key.public_key().0 {
                return Err(WalletError::MalformedKeyFile { line: line_no });
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Write every key back to the key file.
    pub fn save(&self) -> Result<(), WalletError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut contents = Zeroizing::new(String::new());
        for key in &self.keys {
            let priv_hex = Zeroizing::new(hex::encode(key.keypair_bytes()));
            contents.push_str(&priv_hex);
            contents.push(':');
            contents.push_str(&hex::encode(key.public_key().as_bytes()));
            contents.push('\n');
        }
        fs::write(&self.path, contents.as_bytes())?;
        Ok(())
    }

    /// Generate a key, persist it, and return its address.
    pub fn new_address(&mut self) -> Result<PublicKey, WalletError> {
        let key = KeyPair::generate();
        let address = key.public_key();
        self.keys.push(key);
        self.save()?;
        Ok(address)
    }

    /// The public keys of every stored key, in file order.
    pub fn addresses(&self) -> Vec<PublicKey> {
        self.keys.iter().map(KeyPair::public_key).collect()
    }

    /// The first stored address.
    pub fn default_address(&self) -> PublicKey {
        self.keys[0].public_key()
    }

    /// Resolve a public key to its keypair.
    pub fn lookup(&self, pubkey: &PublicKey) -> Option<&KeyPair> {
        self.keys.iter().find(|k| k.public_key() == *pubkey)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
