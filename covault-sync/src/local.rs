//! The local persistent cache seam.
//!
//! The substrate is an OS-backed secure store (keychain, keyring, TPM-sealed
//! file); this crate only defines the interface the reconciler merges
//! against, an in-memory implementation, and an identity-scoping wrapper for
//! stores shared between accounts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// One entry as the local store holds it. Sync bookkeeping travels in
/// `meta`; entries without it are invisible to reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub value: Vec<u8>,
    pub meta: Option<HashMap<String, String>>,
}

pub type LocalResult<T> = Result<T, LocalCacheError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocalCacheError {
    #[error("local entry not found: {0}")]
    NotFound(String),

    #[error("local entry already exists: {0}")]
    AlreadyExists(String),

    #[error("local store failure: {0}")]
    Backend(String),
}

/// Name-keyed persistent store supplied by the embedding application.
pub trait LocalPersistentCache: Send + Sync {
    /// Creates a new entry; fails `AlreadyExists` if the name is taken.
    fn store(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<LocalEntry>;

    /// Replaces an existing entry; fails `NotFound` if absent.
    fn update(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<()>;

    fn delete(&self, name: &str) -> LocalResult<()>;

    fn retrieve_one(&self, name: &str) -> LocalResult<LocalEntry>;

    fn retrieve_all(&self) -> LocalResult<Vec<LocalEntry>>;

    fn exists(&self, name: &str) -> LocalResult<bool>;
}

/// Process-local implementation, for tests and for embeddings without an
/// OS-backed store.
#[derive(Default)]
pub struct InMemoryLocalCache {
    entries: RwLock<HashMap<String, LocalEntry>>,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err<T>(e: std::sync::PoisonError<T>) -> LocalCacheError {
        LocalCacheError::Backend(e.to_string())
    }
}

impl LocalPersistentCache for InMemoryLocalCache {
    fn store(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<LocalEntry> {
        let mut entries = self.entries.write().map_err(Self::lock_err)?;
        if entries.contains_key(name) {
            return Err(LocalCacheError::AlreadyExists(name.to_string()));
        }
        let entry = LocalEntry {
            name: name.to_string(),
            value: value.to_vec(),
            meta,
        };
        entries.insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    fn update(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<()> {
        let mut entries = self.entries.write().map_err(Self::lock_err)?;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| LocalCacheError::NotFound(name.to_string()))?;
        entry.value = value.to_vec();
        entry.meta = meta;
        Ok(())
    }

    fn delete(&self, name: &str) -> LocalResult<()> {
        let mut entries = self.entries.write().map_err(Self::lock_err)?;
        entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| LocalCacheError::NotFound(name.to_string()))
    }

    fn retrieve_one(&self, name: &str) -> LocalResult<LocalEntry> {
        let entries = self.entries.read().map_err(Self::lock_err)?;
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| LocalCacheError::NotFound(name.to_string()))
    }

    fn retrieve_all(&self) -> LocalResult<Vec<LocalEntry>> {
        let entries = self.entries.read().map_err(Self::lock_err)?;
        Ok(entries.values().cloned().collect())
    }

    fn exists(&self, name: &str) -> LocalResult<bool> {
        let entries = self.entries.read().map_err(Self::lock_err)?;
        Ok(entries.contains_key(name))
    }
}

/// Scopes entry names to one identity within a shared underlying store.
///
/// Names are prefixed on the way in and stripped on the way out;
/// `retrieve_all` only surfaces entries belonging to this identity.
pub struct ScopedLocalCache {
    identity: String,
    inner: Arc<dyn LocalPersistentCache>,
}

impl ScopedLocalCache {
    pub fn new(identity: impl Into<String>, inner: Arc<dyn LocalPersistentCache>) -> Self {
        Self {
            identity: identity.into(),
            inner,
        }
    }

    fn prefix(&self) -> String {
        format!("covault.identity={}.", self.identity)
    }

    fn scoped_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }
}

impl LocalPersistentCache for ScopedLocalCache {
    fn store(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<LocalEntry> {
        let mut entry = self.inner.store(&self.scoped_name(name), value, meta)?;
        entry.name = name.to_string();
        Ok(entry)
    }

    fn update(
        &self,
        name: &str,
        value: &[u8],
        meta: Option<HashMap<String, String>>,
    ) -> LocalResult<()> {
        self.inner.update(&self.scoped_name(name), value, meta)
    }

    fn delete(&self, name: &str) -> LocalResult<()> {
        self.inner.delete(&self.scoped_name(name))
    }

    fn retrieve_one(&self, name: &str) -> LocalResult<LocalEntry> {
        let mut entry = self.inner.retrieve_one(&self.scoped_name(name))?;
        entry.name = name.to_string();
        Ok(entry)
    }

    fn retrieve_all(&self) -> LocalResult<Vec<LocalEntry>> {
        let prefix = self.prefix();
        Ok(self
            .inner
            .retrieve_all()?
            .into_iter()
            .filter_map(|mut entry| {
                let name = entry.name.strip_prefix(&prefix)?.to_string();
                entry.name = name;
                Some(entry)
            })
            .collect())
    }

    fn exists(&self, name: &str) -> LocalResult<bool> {
        self.inner.exists(&self.scoped_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_retrieve() {
        let cache = InMemoryLocalCache::new();
        cache.store("a", b"1", None).unwrap();
        assert_eq!(cache.retrieve_one("a").unwrap().value, b"1");
        assert!(cache.exists("a").unwrap());
    }

    #[test]
    fn double_store_rejected() {
        let cache = InMemoryLocalCache::new();
        cache.store("a", b"1", None).unwrap();
        assert_eq!(
            cache.store("a", b"2", None).unwrap_err(),
            LocalCacheError::AlreadyExists("a".into())
        );
    }

    #[test]
    fn update_requires_presence() {
        let cache = InMemoryLocalCache::new();
        assert_eq!(
            cache.update("ghost", b"x", None).unwrap_err(),
            LocalCacheError::NotFound("ghost".into())
        );
    }

    #[test]
    fn scoped_cache_isolates_identities() {
        let shared: Arc<dyn LocalPersistentCache> = Arc::new(InMemoryLocalCache::new());
        let alice = ScopedLocalCache::new("alice", shared.clone());
        let bob = ScopedLocalCache::new("bob", shared.clone());

        alice.store("token", b"a", None).unwrap();
        bob.store("token", b"b", None).unwrap();

        assert_eq!(alice.retrieve_one("token").unwrap().value, b"a");
        assert_eq!(bob.retrieve_one("token").unwrap().value, b"b");
        assert_eq!(alice.retrieve_all().unwrap().len(), 1);

        alice.delete("token").unwrap();
        assert!(!alice.exists("token").unwrap());
        assert!(bob.exists("token").unwrap());
    }

    #[test]
    fn scoped_names_round_trip_unprefixed() {
        let shared: Arc<dyn LocalPersistentCache> = Arc::new(InMemoryLocalCache::new());
        let scoped = ScopedLocalCache::new("dev", shared.clone());

        let entry = scoped.store("api", b"k", None).unwrap();
        assert_eq!(entry.name, "api");
        assert_eq!(scoped.retrieve_all().unwrap()[0].name, "api");

        // The shared store sees the scoped name.
        assert!(shared.exists("covault.identity=dev.api").unwrap());
    }
}
