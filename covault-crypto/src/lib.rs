//! Sign-then-encrypt blob layer for Covault.
//!
//! A blob is produced in two independent steps:
//!
//! 1. **Sign**: the payload is signed with the sender's ed25519 key; the
//!    signer's fingerprint and the signature travel in the clear header.
//! 2. **Encrypt**: a random ChaCha20-Poly1305 content key encrypts the
//!    payload once, and that key is sealed separately for every recipient
//!    X25519 public key.
//!
//! Any recipient can decrypt with their own secret key, then must verify
//! the signature against a trusted public key whose fingerprint matches the
//! embedded signer id. Decryption and origin authentication stay separate,
//! composable steps.

mod envelope;
mod error;
mod keys;
mod provider;

pub use envelope::{open_key, seal_key, BlobHeader, RecipientSlot, SealedKey};
pub use error::{CryptoError, CryptoResult};
pub use keys::{fingerprint, KeyId, Keypair, PrivateKey, PublicKey};
pub use provider::{BlobCrypto, EnvelopeCrypto};
