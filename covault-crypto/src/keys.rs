//! Key material for blob encryption and signing.
//!
//! One keypair bundles an ed25519 signing key with an X25519 exchange key
//! under a single fingerprint id. Recipients are addressed by fingerprint in
//! the blob header, and the signer embeds the same id so readers can pick
//! the right verification key out of a set.

use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Hex SHA-256 fingerprint of a verifying key; stable public identity.
pub type KeyId = String;

/// Computes the fingerprint id for a raw verifying key.
pub fn fingerprint(verifying_key_bytes: &[u8]) -> KeyId {
    hex::encode(Sha256::digest(verifying_key_bytes))
}

/// Public half: verifies signatures, receives sealed content keys.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub id: KeyId,
    pub verifying: VerifyingKey,
    pub exchange: crypto_box::PublicKey,
}

/// Private half: signs payloads, opens sealed content keys.
///
/// The exchange secret zeroizes on drop (from crypto_box).
#[derive(Clone)]
pub struct PrivateKey {
    pub id: KeyId,
    pub signing: SigningKey,
    pub exchange: crypto_box::SecretKey,
}

/// A full keypair; both halves share one fingerprint id.
#[derive(Clone)]
pub struct Keypair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl Keypair {
    /// Generates a fresh keypair from OS randomness.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let exchange = crypto_box::SecretKey::generate(&mut OsRng);
        Self::from_parts(signing, exchange)
    }

    fn from_parts(signing: SigningKey, exchange: crypto_box::SecretKey) -> Self {
        let verifying = signing.verifying_key();
        let id = fingerprint(verifying.as_bytes());
        let public = PublicKey {
            id: id.clone(),
            verifying,
            exchange: exchange.public_key(),
        };
        let private = PrivateKey {
            id,
            signing,
            exchange,
        };
        Self { private, public }
    }
}

impl PrivateKey {
    /// Exports the key as 64 raw bytes (signing seed then exchange secret).
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.signing.to_bytes());
        out[32..].copy_from_slice(&self.exchange.to_bytes());
        out
    }

    /// Reconstructs a private key from `to_bytes` output.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != 64 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 64,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes[32..]);

        let signing = SigningKey::from_bytes(&seed);
        let exchange = crypto_box::SecretKey::from(secret);
        Ok(Keypair::from_parts(signing, exchange).private)
    }

    /// Derives the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            id: self.id.clone(),
            verifying: self.signing.verifying_key(),
            exchange: self.exchange.public_key(),
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("PrivateKey").field("id", &self.id).finish()
    }
}
