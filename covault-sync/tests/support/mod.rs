//! Test wiring: a cloud entry store backed by in-memory fakes.

use async_trait::async_trait;
use covault_cloud::{
    AuthToken, CloudEntryStore, EncryptedBlob, RecipientSet, RemoteBlobClient, SecretVault,
    TokenContext, TokenProvider, VaultError, VaultResult,
};
use covault_crypto::{EnvelopeCrypto, Keypair};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

/// Minimal in-memory stand-in for the remote blob service.
#[derive(Default)]
pub struct MemoryBlobClient {
    state: Mutex<Option<(Vec<u8>, Vec<u8>, u64)>>,
}

fn content_hash(meta: &[u8], value: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(meta);
    hasher.update(value);
    hasher.finalize().to_vec()
}

#[async_trait]
impl RemoteBlobClient for MemoryBlobClient {
    async fn fetch(&self, _token: &AuthToken) -> VaultResult<EncryptedBlob> {
        let state = self.state.lock().unwrap();
        let (meta, value, version) = state.clone().ok_or(VaultError::BlobNotFound)?;
        let hash = content_hash(&meta, &value);
        Ok(EncryptedBlob {
            meta,
            value,
            version,
            content_hash: hash,
        })
    }

    async fn replace(
        &self,
        meta: &[u8],
        value: &[u8],
        previous_hash: Option<&[u8]>,
        _token: &AuthToken,
    ) -> VaultResult<EncryptedBlob> {
        let mut state = self.state.lock().unwrap();
        let current_hash = state.as_ref().map(|(m, v, _)| content_hash(m, v));
        if current_hash.as_deref() != previous_hash {
            return Err(VaultError::Conflict);
        }
        let version = state.as_ref().map(|(_, _, v)| v + 1).unwrap_or(1);
        *state = Some((meta.to_vec(), value.to_vec(), version));
        Ok(EncryptedBlob {
            meta: meta.to_vec(),
            value: value.to_vec(),
            version,
            content_hash: content_hash(meta, value),
        })
    }
}

pub struct StaticTokenProvider;

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _context: &TokenContext) -> VaultResult<AuthToken> {
        Ok(AuthToken::new("test-token"))
    }
}

/// A cloud entry store wired to in-memory fakes.
pub fn cloud_store() -> Arc<CloudEntryStore> {
    let keypair = Keypair::generate();
    let recipients = RecipientSet::new(vec![keypair.public.clone()], keypair.private)
        .expect("non-empty recipient set");
    let vault = Arc::new(SecretVault::new(
        Arc::new(EnvelopeCrypto),
        Arc::new(MemoryBlobClient::default()),
        Arc::new(StaticTokenProvider),
        recipients,
    ));
    Arc::new(CloudEntryStore::new(vault))
}
