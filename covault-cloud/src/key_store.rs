//! Named private-key storage through the vault blob.
//!
//! A thin specialization of the blob round trip for callers that only need
//! to park raw key material: the payload is a JSON map of name to exported
//! key bytes rather than the full entry model.

use crate::error::{StoreError, StoreResult, VaultError};
use crate::vault::SecretVault;
use covault_crypto::PrivateKey;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type KeyMap = BTreeMap<String, Vec<u8>>;

/// Stores named private keys inside the encrypted blob.
pub struct KeyEntryStore {
    vault: Arc<SecretVault>,
    cache: RwLock<KeyMap>,
    op_lock: Mutex<()>,
}

impl KeyEntryStore {
    pub fn new(vault: Arc<SecretVault>) -> Self {
        Self {
            vault,
            cache: RwLock::new(KeyMap::new()),
            op_lock: Mutex::new(()),
        }
    }

    /// Refreshes the key cache from the remote blob; a never-written store
    /// yields an empty cache.
    pub async fn sync_keys(&self) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        match self.vault.pull().await {
            Ok(blob) => {
                *self.cache.write().await = parse_keys(&blob.value)?;
                Ok(())
            }
            Err(VaultError::EmptyStore) => {
                *self.cache.write().await = KeyMap::new();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores (or replaces) a named key in one push cycle.
    pub async fn store_key(&self, name: &str, key: &PrivateKey) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;

        let mut working = self.cache.read().await.clone();
        working.insert(name.to_string(), key.to_bytes().to_vec());

        let echoed = self.push_working(&working).await?;
        *self.cache.write().await = echoed;
        Ok(())
    }

    /// Loads a named key from the cache. Call [`Self::sync_keys`] first to
    /// see remote changes.
    pub async fn load_key(&self, name: &str) -> StoreResult<PrivateKey> {
        let cache = self.cache.read().await;
        let bytes = cache
            .get(name)
            .ok_or_else(|| StoreError::EntryNotFound(name.to_string()))?;
        PrivateKey::from_bytes(bytes).map_err(|e| StoreError::Vault(VaultError::Crypto(e)))
    }

    /// Pure cache read.
    pub async fn exists_key(&self, name: &str) -> bool {
        self.cache.read().await.contains_key(name)
    }

    /// Deletes a named key in one push cycle; fails `EntryNotFound` before
    /// any network call if the name is absent.
    pub async fn delete_key(&self, name: &str) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;

        let mut working = self.cache.read().await.clone();
        if working.remove(name).is_none() {
            return Err(StoreError::EntryNotFound(name.to_string()));
        }

        let echoed = self.push_working(&working).await?;
        *self.cache.write().await = echoed;
        Ok(())
    }

    /// Wipes every stored key by pushing the empty payload.
    pub async fn remove_all_keys(&self) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        let previous_hash = self.vault.last_content_hash().await;
        self.vault.push(Vec::new(), previous_hash).await?;
        self.cache.write().await.clear();
        Ok(())
    }

    async fn push_working(&self, working: &KeyMap) -> StoreResult<KeyMap> {
        let payload = serde_json::to_vec(working)?;
        let previous_hash = self.vault.last_content_hash().await;
        let response = self.vault.push(payload, previous_hash).await?;
        parse_keys(&response.value)
    }
}

fn parse_keys(bytes: &[u8]) -> StoreResult<KeyMap> {
    if bytes.is_empty() {
        return Ok(KeyMap::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}
