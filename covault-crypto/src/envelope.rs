//! Blob header and per-recipient content-key envelopes.
//!
//! The content key is sealed for each recipient with an ephemeral X25519
//! exchange + XSalsa20-Poly1305, so any holder of a matching secret key can
//! recover it without the sender's identity leaking from the envelope
//! itself. Origin authentication comes from the ed25519 signature carried in
//! the clear header, not from the encryption layer.

use crate::error::{CryptoError, CryptoResult};
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Sealed copy of the 32-byte content key for one recipient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedKey {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce (24 bytes).
    pub nonce: [u8; 24],
    /// Encrypted content key (ciphertext + Poly1305 tag).
    pub ciphertext: Vec<u8>,
}

/// One recipient's slot in the blob header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipientSlot {
    pub recipient_id: String,
    pub sealed_key: SealedKey,
}

/// Clear-text blob header: signer identity, signature over the plaintext,
/// content nonce, and one sealed content key per recipient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobHeader {
    pub signer_id: String,
    pub signature: Vec<u8>,
    /// ChaCha20-Poly1305 nonce for the payload ciphertext.
    pub nonce: [u8; 12],
    pub recipients: Vec<RecipientSlot>,
}

impl BlobHeader {
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Malformed(e.to_string()))
    }
}

/// Seals the content key for a recipient using an ephemeral keypair.
pub fn seal_key(
    content_key: &[u8],
    recipient_pk: &crypto_box::PublicKey,
) -> CryptoResult<SealedKey> {
    let ephemeral = crypto_box::SecretKey::generate(&mut rand::rngs::OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);

    let mut nonce_bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce_bytes), content_key)
        .map_err(|e| CryptoError::Encryption(format!("key seal failed: {e}")))?;

    Ok(SealedKey {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a sealed content key with the recipient's secret key.
pub fn open_key(sealed: &SealedKey, recipient_sk: &crypto_box::SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = crypto_box::PublicKey::from(sealed.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&sealed.nonce),
            sealed.ciphertext.as_ref(),
        )
        .map_err(|_| {
            CryptoError::Decryption("key envelope open failed (wrong key or tampered data)".to_string())
        })
}
