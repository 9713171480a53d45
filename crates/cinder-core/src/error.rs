//! Error types for the Cinder protocol.
use thiserror::Error;

use crate::types::OutPoint;

/// Reasons a transaction fails to apply to a UTXO set.
///
/// Every variant invalidates the transaction; `UtxoNotFound`,
/// `BadSignature` and `AmountUnderflow` are the specific causes callers
/// may want to distinguish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown UTXO: {0}")] UtxoNotFound(OutPoint),
    #[error("bad signature on input {index}")] BadSignature { index: usize },
    #[error("outputs exceed inputs: in {inputs}, out {outputs}")] AmountUnderflow { inputs: u64, outputs: u64 },
    #[error("empty inputs or outputs")] Empty,
    #[error("value overflow")] ValueOverflow,
    #[error("first transaction is not a coinbase")] MissingCoinbase,
    #[error("coinbase transaction in block body")] UnexpectedCoinbase,
}

/// Reasons the validator rejects a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block has no linked parent")] MissingParent,
    #[error("prev_hash does not match parent hash")] BadLinkage,
    #[error("timestamp {timestamp} beyond limit {limit}")] TimestampTooNew { timestamp: u64, limit: u64 },
    #[error("timestamp below median of recent blocks")] TimestampBeforeMedian,
    #[error("wrong difficulty: got {got}, expected {expected}")] WrongDifficulty { got: u8, expected: u8 },
    #[error("insufficient proof-of-work")] InsufficientPow,
    #[error("merkle root mismatch")] BadMerkleRoot,
    #[error("invalid transaction: {0}")] Transaction(#[from] TransactionError),
    #[error("block mints too much: created {created}, allowed {allowed}")] ExcessiveReward { created: u64, allowed: u64 },
    #[error("chain state: {0}")] State(#[from] ChainStateError),
}

/// Misuse of the UTXO set's apply/revert protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("block is not the applied tip")] NotTip,
    #[error("undo record missing for applied tip")] MissingUndo,
    #[error("transaction failed during chain move: {0}")] Apply(#[from] TransactionError),
}

/// Wire decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input: wanted {wanted} bytes, {remaining} left")] UnexpectedEnd { wanted: usize, remaining: usize },
    #[error("varint value does not fit the target width")] VarintOverflow,
}

/// Key material failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("malformed private key")] InvalidPrivateKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("signature verification failed")] VerificationFailed,
}

/// Reasons the mempool refuses a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool")] AlreadyKnown,
    #[error("fee {fee} below minimum {minimum}")] FeeTooLow { fee: u64, minimum: u64 },
    #[error(transparent)] Invalid(#[from] TransactionError),
}

/// Miner lifecycle misuse or startup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinerError {
    #[error("miner is already running")] AlreadyRunning,
    #[error("miner is not running")] NotRunning,
    #[error("failed to spawn miner thread: {0}")] Spawn(String),
}
