//! The crypto seam consumed by the vault.

use crate::envelope::{seal_key, open_key, BlobHeader, RecipientSlot};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateKey, PublicKey};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use ed25519_dalek::{Signature, Signer, Verifier};
use rand::RngCore;
use zeroize::Zeroizing;

/// Stateless sign/encrypt and verify/decrypt over raw bytes.
///
/// `sign_then_encrypt` returns `(meta, ciphertext)`: the clear header bytes
/// and the payload ciphertext. `verify_then_decrypt` is its inverse and
/// authenticates the origin independently of who could decrypt.
pub trait BlobCrypto: Send + Sync {
    fn sign_then_encrypt(
        &self,
        payload: &[u8],
        private_key: &PrivateKey,
        public_keys: &[PublicKey],
    ) -> CryptoResult<(Vec<u8>, Vec<u8>)>;

    fn verify_then_decrypt(
        &self,
        meta: &[u8],
        ciphertext: &[u8],
        private_key: &PrivateKey,
        public_keys: &[PublicKey],
    ) -> CryptoResult<Vec<u8>>;
}

/// Default implementation: ed25519 signature in the clear header, random
/// ChaCha20-Poly1305 content key sealed per recipient via X25519 envelopes.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeCrypto;

impl BlobCrypto for EnvelopeCrypto {
    fn sign_then_encrypt(
        &self,
        payload: &[u8],
        private_key: &PrivateKey,
        public_keys: &[PublicKey],
    ) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
        if public_keys.is_empty() {
            return Err(CryptoError::NoRecipients);
        }

        let signature = private_key.signing.sign(payload);

        let mut content_key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *content_key);
        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&*content_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|e| CryptoError::Encryption(format!("payload encryption failed: {e}")))?;

        let recipients = public_keys
            .iter()
            .map(|pk| {
                Ok(RecipientSlot {
                    recipient_id: pk.id.clone(),
                    sealed_key: seal_key(&*content_key, &pk.exchange)?,
                })
            })
            .collect::<CryptoResult<Vec<_>>>()?;

        let header = BlobHeader {
            signer_id: private_key.id.clone(),
            signature: signature.to_bytes().to_vec(),
            nonce,
            recipients,
        };

        Ok((header.to_bytes()?, ciphertext))
    }

    fn verify_then_decrypt(
        &self,
        meta: &[u8],
        ciphertext: &[u8],
        private_key: &PrivateKey,
        public_keys: &[PublicKey],
    ) -> CryptoResult<Vec<u8>> {
        let header = BlobHeader::from_bytes(meta)?;

        let slot = header
            .recipients
            .iter()
            .find(|slot| slot.recipient_id == private_key.id)
            .ok_or(CryptoError::RecipientNotFound)?;

        let content_key = Zeroizing::new(open_key(&slot.sealed_key, &private_key.exchange)?);
        if content_key.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: content_key.len(),
            });
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&content_key[..]));
        let payload = cipher
            .decrypt(Nonce::from_slice(&header.nonce), ciphertext)
            .map_err(|_| {
                CryptoError::Decryption("payload decryption failed (wrong key or tampered data)".to_string())
            })?;

        // Signature check comes after decryption: the signer id names which
        // public key must verify, and it must be one the caller trusts.
        let signer = public_keys
            .iter()
            .find(|pk| pk.id == header.signer_id)
            .ok_or(CryptoError::SignerNotFound)?;

        let sig_bytes: [u8; 64] = header
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::Malformed("signature length".to_string()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        signer
            .verifying
            .verify(&payload, &signature)
            .map_err(|_| CryptoError::SignatureInvalid)?;

        Ok(payload)
    }
}
