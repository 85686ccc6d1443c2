//! In-memory entry cache backed by the vault blob.
//!
//! The cache is only ever replaced wholesale with the map decoded from the
//! server's authoritative response, never mutated speculatively. Every
//! mutating operation is one push cycle: validate against the current cache,
//! apply to a working copy, push, then adopt whatever the server echoed
//! (which may differ from the working copy if a concurrent writer got in
//! first and this push still won).

use crate::entries::{parse_entries, serialize_entries};
use crate::error::{StoreError, StoreResult, VaultError};
use crate::vault::SecretVault;
use covault_crypto::{PrivateKey, PublicKey};
use covault_types::{Entry, EntryMap};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Input for a store operation: the entry as the caller wants it created.
#[derive(Clone, Debug)]
pub struct NewEntry {
    pub name: String,
    pub value: Vec<u8>,
    pub meta: Option<HashMap<String, String>>,
}

impl NewEntry {
    pub fn new(
        name: impl Into<String>,
        value: Vec<u8>,
        meta: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            meta,
        }
    }
}

/// Name-keyed entry cache, round-tripping every mutation through the vault.
pub struct CloudEntryStore {
    vault: Arc<SecretVault>,
    cache: RwLock<EntryMap>,
    /// Serializes mutating cycles so read-modify-push-replace is atomic
    /// with respect to other mutations on this instance.
    op_lock: Mutex<()>,
}

impl CloudEntryStore {
    pub fn new(vault: Arc<SecretVault>) -> Self {
        Self {
            vault,
            cache: RwLock::new(EntryMap::new()),
            op_lock: Mutex::new(()),
        }
    }

    pub fn vault(&self) -> &Arc<SecretVault> {
        &self.vault
    }

    /// Refreshes the cache from the remote blob. A store that has never been
    /// written yields an empty cache, not an error.
    pub async fn retrieve_cloud_entries(&self) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        match self.vault.pull().await {
            Ok(blob) => {
                *self.cache.write().await = parse_entries(&blob.value)?;
                Ok(())
            }
            Err(VaultError::EmptyStore) => {
                *self.cache.write().await = EntryMap::new();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a single new entry. Fails `EntryAlreadyExists` before any
    /// network call if the name is already present.
    pub async fn store_entry(
        &self,
        name: impl Into<String>,
        value: Vec<u8>,
        meta: Option<HashMap<String, String>>,
    ) -> StoreResult<Entry> {
        let mut created = self
            .store_entries(vec![NewEntry::new(name, value, meta)])
            .await?;
        Ok(created.remove(0))
    }

    /// Stores a batch of new entries in one push cycle.
    ///
    /// Preconditions are validated across the whole batch (no name may exist
    /// in the cache, no duplicates within the batch) before anything is
    /// mutated; partial application never occurs.
    pub async fn store_entries(&self, requests: Vec<NewEntry>) -> StoreResult<Vec<Entry>> {
        let _guard = self.op_lock.lock().await;

        let mut working = self.cache.read().await.clone();
        let mut seen = std::collections::BTreeSet::new();
        for request in &requests {
            if working.contains_key(&request.name) || !seen.insert(request.name.clone()) {
                return Err(StoreError::EntryAlreadyExists(request.name.clone()));
            }
        }

        let created: Vec<Entry> = requests
            .into_iter()
            .map(|r| Entry::new(r.name, r.value, r.meta))
            .collect();
        for entry in &created {
            working.insert(entry.name.clone(), entry.clone());
        }

        let echoed = self.push_working(&working).await?;
        *self.cache.write().await = echoed;
        debug!("stored {} entries", created.len());
        Ok(created)
    }

    /// Updates an existing entry, preserving its creation timestamp. Fails
    /// `EntryNotFound` before any network call if the name is absent.
    pub async fn update_entry(
        &self,
        name: &str,
        value: Vec<u8>,
        meta: Option<HashMap<String, String>>,
    ) -> StoreResult<Entry> {
        let _guard = self.op_lock.lock().await;

        let mut working = self.cache.read().await.clone();
        let updated = match working.get(name) {
            Some(existing) => existing.with_value(value, meta),
            None => return Err(StoreError::EntryNotFound(name.to_string())),
        };
        working.insert(updated.name.clone(), updated.clone());

        let echoed = self.push_working(&working).await?;
        *self.cache.write().await = echoed;
        Ok(updated)
    }

    pub async fn delete_entry(&self, name: &str) -> StoreResult<()> {
        self.delete_entries(&[name]).await
    }

    /// Deletes a batch of entries in one push cycle; every name must exist
    /// before any is removed.
    pub async fn delete_entries(&self, names: &[&str]) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;

        let mut working = self.cache.read().await.clone();
        for name in names {
            if !working.contains_key(*name) {
                return Err(StoreError::EntryNotFound(name.to_string()));
            }
        }
        for name in names {
            working.remove(*name);
        }

        let echoed = self.push_working(&working).await?;
        *self.cache.write().await = echoed;
        Ok(())
    }

    /// Deletes every entry by pushing the empty map.
    pub async fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        let echoed = self.push_working(&EntryMap::new()).await?;
        *self.cache.write().await = echoed;
        Ok(())
    }

    /// Rotates the vault's recipient set and adopts the re-encrypted blob.
    /// An empty remote store is a success with an unchanged cache.
    pub async fn update_recipients(
        &self,
        new_public_keys: Option<Vec<PublicKey>>,
        new_private_key: Option<PrivateKey>,
    ) -> StoreResult<()> {
        let _guard = self.op_lock.lock().await;
        match self
            .vault
            .update_recipients(new_public_keys, new_private_key)
            .await
        {
            Ok(blob) => {
                *self.cache.write().await = parse_entries(&blob.value)?;
                Ok(())
            }
            Err(VaultError::EmptyStore) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Pure cache read; call [`Self::retrieve_cloud_entries`] first to see
    /// remote changes.
    pub async fn retrieve_entry(&self, name: &str) -> Option<Entry> {
        self.cache.read().await.get(name).cloned()
    }

    /// Pure cache read of every entry.
    pub async fn retrieve_all_entries(&self) -> Vec<Entry> {
        self.cache.read().await.values().cloned().collect()
    }

    /// Pure cache read.
    pub async fn exists_entry(&self, name: &str) -> bool {
        self.cache.read().await.contains_key(name)
    }

    async fn push_working(&self, working: &EntryMap) -> StoreResult<EntryMap> {
        let payload = serialize_entries(working)?;
        let previous_hash = self.vault.last_content_hash().await;
        let response = self.vault.push(payload, previous_hash).await?;
        Ok(parse_entries(&response.value)?)
    }
}
