//! Cryptographic primitives: double SHA-256 and Ed25519 signatures.
//!
//! All protocol hashes (txids, block hashes, merkle nodes) are
//! `SHA-256(SHA-256(data))`. Transaction inputs are signed with Ed25519
//! over the raw txid; no additional domain separation is applied.

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, PublicKey, Signature};

/// Length of the serialized private key (Ed25519 seed plus public half).
pub const PRIVKEY_LEN: usize = 64;

/// Double SHA-256 of `data`.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// Ed25519 keypair for signing transaction inputs.
///
/// Wraps [`ed25519_dalek::SigningKey`]; the secret half is zeroized on
/// drop by the underlying library and excluded from `Debug` output.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self { signing_key: ed25519_dalek::SigningKey::generate(&mut csprng) }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing_key: ed25519_dalek::SigningKey::from_bytes(&seed) }
    }

    /// Restore a keypair from its 64-byte serialized form.
    ///
    /// The trailing 32 bytes must be the public key matching the seed.
    pub fn from_keypair_bytes(bytes: &[u8; PRIVKEY_LEN]) -> Result<Self, CryptoError> {
        let signing_key = ed25519_dalek::SigningKey::from_keypair_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Serialize to the 64-byte seed-plus-public form.
    pub fn keypair_bytes(&self) -> [u8; PRIVKEY_LEN] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message, typically a txid.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self { signing_key: self.signing_key.clone() }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature over `message` against a raw public key.
pub fn verify_signature(
    message: &[u8],
    pubkey: &PublicKey,
    signature: &Signature,
) -> Result<(), CryptoError> {
    let vk = ed25519_dalek::VerifyingKey::from_bytes(&pubkey.0)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}
