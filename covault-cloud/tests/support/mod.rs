//! Shared test doubles for vault and entry-store tests.

use async_trait::async_trait;
use covault_cloud::{
    AuthToken, EncryptedBlob, RecipientSet, RemoteBlobClient, SecretVault, TokenContext,
    TokenProvider, VaultError, VaultResult,
};
use covault_crypto::{EnvelopeCrypto, Keypair};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the remote blob service.
///
/// Computes content hashes the way the service would (SHA-256 over meta and
/// value), enforces the optimistic-concurrency precondition, and can be
/// scripted to reject calls with 401-equivalents or to tamper with the
/// bytes it echoes back.
#[derive(Default)]
pub struct MemoryBlobClient {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    blob: Option<(Vec<u8>, Vec<u8>)>,
    version: u64,
    /// Number of upcoming calls to reject as unauthorized.
    unauthorized_budget: usize,
    /// When set, the echo of the next replace has a flipped value byte.
    tamper_echo: bool,
    fetch_calls: usize,
    replace_calls: usize,
}

fn content_hash(meta: &[u8], value: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(meta);
    hasher.update(value);
    hasher.finalize().to_vec()
}

impl MemoryBlobClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the next `calls` network calls as unauthorized.
    pub fn reject_unauthorized(&self, calls: usize) {
        self.state.lock().unwrap().unauthorized_budget = calls;
    }

    /// Tampers with the echo of the next replace.
    pub fn tamper_next_echo(&self) {
        self.state.lock().unwrap().tamper_echo = true;
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn replace_calls(&self) -> usize {
        self.state.lock().unwrap().replace_calls
    }

    /// The blob as the server currently holds it.
    pub fn stored(&self) -> Option<EncryptedBlob> {
        let state = self.state.lock().unwrap();
        state.blob.as_ref().map(|(meta, value)| EncryptedBlob {
            meta: meta.clone(),
            value: value.clone(),
            version: state.version,
            content_hash: content_hash(meta, value),
        })
    }
}

#[async_trait]
impl RemoteBlobClient for MemoryBlobClient {
    async fn fetch(&self, _token: &AuthToken) -> VaultResult<EncryptedBlob> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if state.unauthorized_budget > 0 {
            state.unauthorized_budget -= 1;
            return Err(VaultError::Unauthorized("token expired".into()));
        }
        let (meta, value) = state.blob.clone().ok_or(VaultError::BlobNotFound)?;
        let hash = content_hash(&meta, &value);
        Ok(EncryptedBlob {
            meta,
            value,
            version: state.version,
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
        state.replace_calls += 1;
        if state.unauthorized_budget > 0 {
            state.unauthorized_budget -= 1;
            return Err(VaultError::Unauthorized("token expired".into()));
        }

        let current_hash = state
            .blob
            .as_ref()
            .map(|(m, v)| content_hash(m, v));
        if current_hash.as_deref() != previous_hash {
            return Err(VaultError::Conflict);
        }

        state.blob = Some((meta.to_vec(), value.to_vec()));
        state.version += 1;

        let mut echo_value = value.to_vec();
        if state.tamper_echo {
            state.tamper_echo = false;
            if let Some(byte) = echo_value.first_mut() {
                *byte ^= 0xFF;
            }
        }
        let hash = content_hash(meta, &echo_value);
        Ok(EncryptedBlob {
            meta: meta.to_vec(),
            value: echo_value,
            version: state.version,
            content_hash: hash,
        })
    }
}

/// Token provider that records every acquisition context.
#[derive(Default)]
pub struct RecordingTokenProvider {
    calls: Mutex<Vec<bool>>,
    counter: AtomicUsize,
}

impl RecordingTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `force_reload` flag of every call, in order.
    pub fn reload_flags(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenProvider for RecordingTokenProvider {
    async fn get_token(&self, context: &TokenContext) -> VaultResult<AuthToken> {
        self.calls.lock().unwrap().push(context.force_reload);
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(AuthToken::new(format!("token-{n}")))
    }
}

/// A vault wired to in-memory fakes, plus handles to script them.
pub struct TestVault {
    pub vault: Arc<SecretVault>,
    pub client: Arc<MemoryBlobClient>,
    pub tokens: Arc<RecordingTokenProvider>,
    pub keypair: Keypair,
}

pub fn test_vault() -> TestVault {
    let keypair = Keypair::generate();
    test_vault_with_keys(keypair)
}

pub fn test_vault_with_keys(keypair: Keypair) -> TestVault {
    let client = Arc::new(MemoryBlobClient::new());
    let tokens = Arc::new(RecordingTokenProvider::new());
    let recipients = RecipientSet::new(vec![keypair.public.clone()], keypair.private.clone())
        .expect("non-empty recipient set");
    let vault = Arc::new(SecretVault::new(
        Arc::new(EnvelopeCrypto),
        client.clone(),
        tokens.clone(),
        recipients,
    ));
    TestVault {
        vault,
        client,
        tokens,
        keypair,
    }
}
