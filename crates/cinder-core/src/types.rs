//! Protocol model: hashes, outputs, inputs, transactions and blocks,
//! with their canonical wire encoding.
//!
//! Wire layout (all integers big-endian):
//! - header: `prev_hash ‖ merkle_root ‖ timestamp(u64) ‖ diff(u8) ‖ nonce(u64)`
//! - block: `header ‖ tx_count(u32) ‖ tx[..]`
//! - transaction: `varuint(n_in) ‖ inputs ‖ varuint(n_out) ‖ outputs`
//! - input: `txid ‖ index(u32) ‖ signature`
//! - output: `varuint(amount) ‖ pubkey`
//!
//! The txid is the double SHA-256 of the transaction with every input's
//! signature omitted, so signatures never sign themselves and signature
//! malleability cannot change the txid.

use std::fmt;

use crate::codec::{Reader, Writer};
use crate::crypto::sha256d;
use crate::error::CodecError;

/// A 32-byte hash: txids, block hashes and merkle roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash, used as the coinbase input's txid marker.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A raw 32-byte Ed25519 public key, used directly as the payment address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A raw 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// All-zero placeholder carried by coinbase inputs.
    pub const ZERO: Self = Self([0u8; 64]);

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 64]
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Reference to an output of a previous transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_bytes(self.txid.as_bytes());
        w.write_u32(self.index);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            txid: Hash256(r.read_array()?),
            index: r.read_u32()?,
        })
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction output: an amount payable to a public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub amount: u64,
    pub pubkey: PublicKey,
}

impl Output {
    pub fn encode(&self, w: &mut Writer) {
        w.write_varuint(self.amount as u128);
        w.write_bytes(self.pubkey.as_bytes());
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: r.read_varuint_u64()?,
            pubkey: PublicKey(r.read_array()?),
        })
    }
}

/// A transaction input spending a previous output.
///
/// A coinbase input references the all-zero txid; its index is an
/// arbitrary disambiguator making coinbase txids unique and its
/// signature is all zeros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub prev: OutPoint,
    pub signature: Signature,
}

impl Input {
    pub fn is_coinbase(&self) -> bool {
        self.prev.txid.is_zero()
    }

    pub fn encode(&self, w: &mut Writer) {
        self.prev.encode(w);
        w.write_bytes(self.signature.as_bytes());
    }

    fn encode_without_signature(&self, w: &mut Writer) {
        self.prev.encode(w);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prev: OutPoint::decode(r)?,
            signature: Signature(r.read_array()?),
        })
    }
}

/// An ordered list of inputs and outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// A coinbase mints the block reward: exactly one input carrying the
    /// all-zero txid marker.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Sum of output amounts, `None` on overflow.
    pub fn output_total(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_varuint(self.inputs.len() as u128);
        for input in &self.inputs {
            input.encode(w);
        }
        w.write_varuint(self.outputs.len() as u128);
        for output in &self.outputs {
            output.encode(w);
        }
    }

    fn encode_without_signatures(&self, w: &mut Writer) {
        w.write_varuint(self.inputs.len() as u128);
        for input in &self.inputs {
            input.encode_without_signature(w);
        }
        w.write_varuint(self.outputs.len() as u128);
        for output in &self.outputs {
            output.encode(w);
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let n_inputs = r.read_varuint_u64()? as usize;
        let mut inputs = Vec::with_capacity(n_inputs.min(1024));
        for _ in 0..n_inputs {
            inputs.push(Input::decode(r)?);
        }
        let n_outputs = r.read_varuint_u64()? as usize;
        let mut outputs = Vec::with_capacity(n_outputs.min(1024));
        for _ in 0..n_outputs {
            outputs.push(Output::decode(r)?);
        }
        Ok(Self { inputs, outputs })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// The transaction ID: double SHA-256 of the signature-stripped form.
    pub fn txid(&self) -> Hash256 {
        let mut w = Writer::new();
        self.encode_without_signatures(&mut w);
        sha256d(&w.into_bytes())
    }
}

/// Block header carrying the proof-of-work puzzle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u64,
    pub diff: u8,
    pub nonce: u64,
}

impl BlockHeader {
    /// Serialized header length: two hashes plus timestamp, diff, nonce.
    pub const ENCODED_LEN: usize = 32 + 32 + 8 + 1 + 8;

    pub fn encode(&self, w: &mut Writer) {
        w.write_bytes(self.prev_hash.as_bytes());
        w.write_bytes(self.merkle_root.as_bytes());
        w.write_u64(self.timestamp);
        w.write_u8(self.diff);
        w.write_u64(self.nonce);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prev_hash: Hash256(r.read_array()?),
            merkle_root: Hash256(r.read_array()?),
            timestamp: r.read_u64()?,
            diff: r.read_u8()?,
            nonce: r.read_u64()?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(Self::ENCODED_LEN);
        self.encode(&mut w);
        w.into_bytes()
    }

    /// The block hash: double SHA-256 of the serialized header.
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.serialize())
    }
}

/// A block: header plus ordered transactions. The first transaction of
/// a mined block must be its only coinbase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn encode(&self, w: &mut Writer) {
        self.header.encode(w);
        w.write_u32(self.transactions.len() as u32);
        for tx in &self.transactions {
            tx.encode(w);
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let header = BlockHeader::decode(r)?;
        let count = r.read_u32()? as usize;
        let mut transactions = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            transactions.push(Transaction::decode(r)?);
        }
        Ok(Self { header, transactions })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// The merkle root over the full serializations of the transactions
    /// in block order.
    pub fn compute_merkle_root(&self) -> Hash256 {
        let leaves: Vec<Vec<u8>> = self.transactions.iter().map(|tx| tx.serialize()).collect();
        crate::merkle::merkle_root(&leaves)
    }

    /// Recompute and store the merkle root after editing transactions.
    pub fn update_merkle_root(&mut self) {
        self.header.merkle_root = self.compute_merkle_root();
    }
}
