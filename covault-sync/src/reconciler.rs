//! Three-way merge of the cloud snapshot into the local cache.

use crate::error::SyncResult;
use crate::local::{LocalCacheError, LocalEntry, LocalPersistentCache};
use crate::markers;
use chrono::{DateTime, Utc};
use covault_cloud::CloudEntryStore;
use covault_types::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Merges the cloud entry snapshot into a local persistent cache.
///
/// The merge is one-directional: the cloud is the source of truth. A local
/// entry modified more recently than its cloud counterpart is left alone but
/// never uploaded; write-through happens only via [`Self::store_entry`] and
/// [`Self::update_entry`], which hit the cloud first. Local entries without
/// sync markers belong to the embedding application and are never touched.
pub struct LocalReconciler {
    cloud: Arc<CloudEntryStore>,
    local: Arc<dyn LocalPersistentCache>,
}

impl LocalReconciler {
    pub fn new(cloud: Arc<CloudEntryStore>, local: Arc<dyn LocalPersistentCache>) -> Self {
        Self { cloud, local }
    }

    /// One reconciliation pass: refresh the cloud cache, then delete / add /
    /// compare against the marker-carrying local entries. Steps already
    /// applied are not rolled back if a later step fails.
    pub async fn sync(&self) -> SyncResult<()> {
        // An absent remote blob is an empty remote set, not an error.
        self.cloud.retrieve_cloud_entries().await?;
        let remote: BTreeMap<String, Entry> = self
            .cloud
            .retrieve_all_entries()
            .await
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();

        let managed: Vec<(LocalEntry, DateTime<Utc>)> = self
            .local
            .retrieve_all()?
            .into_iter()
            .filter_map(|entry| {
                markers::parse(entry.meta.as_ref()).map(|(_, modified)| (entry, modified))
            })
            .collect();

        let local_names: BTreeSet<&str> =
            managed.iter().map(|(e, _)| e.name.as_str()).collect();
        let remote_names: BTreeSet<&str> = remote.keys().map(String::as_str).collect();

        let to_delete: Vec<&str> = local_names.difference(&remote_names).copied().collect();
        let to_add: Vec<&str> = remote_names.difference(&local_names).copied().collect();
        let to_compare: Vec<&str> = local_names.intersection(&remote_names).copied().collect();
        debug!(
            deleted = to_delete.len(),
            added = to_add.len(),
            compared = to_compare.len(),
            "reconciling local cache"
        );

        for name in to_delete {
            self.local.delete(name)?;
        }

        for name in to_add {
            let entry = &remote[name];
            self.local
                .store(name, &entry.value, Some(markers::for_entry(entry)?))?;
        }

        for name in to_compare {
            let entry = &remote[name];
            let (_, local_modified) = managed
                .iter()
                .find_map(|(e, m)| (e.name == name).then_some((e, *m)))
                .expect("name came from the managed set");
            // Strictly newer remote wins; anything else leaves local alone.
            if local_modified < entry.modified_at {
                self.local
                    .update(name, &entry.value, Some(markers::for_entry(entry)?))?;
            }
        }

        Ok(())
    }

    /// Stores a new entry in the cloud, then mirrors it into the local cache
    /// with its markers.
    pub async fn store_entry(
        &self,
        name: impl Into<String>,
        value: Vec<u8>,
        meta: Option<HashMap<String, String>>,
    ) -> SyncResult<Entry> {
        let entry = self.cloud.store_entry(name, value, meta).await?;
        self.local
            .store(&entry.name, &entry.value, Some(markers::for_entry(&entry)?))?;
        Ok(entry)
    }

    /// Updates an entry in the cloud, then mirrors the change locally. A
    /// local copy that does not exist yet (synced away or never synced) is
    /// created instead.
    pub async fn update_entry(
        &self,
        name: &str,
        value: Vec<u8>,
        meta: Option<HashMap<String, String>>,
    ) -> SyncResult<Entry> {
        let entry = self.cloud.update_entry(name, value, meta).await?;
        let local_meta = Some(markers::for_entry(&entry)?);
        match self.local.update(&entry.name, &entry.value, local_meta.clone()) {
            Err(LocalCacheError::NotFound(_)) => {
                self.local.store(&entry.name, &entry.value, local_meta)?;
            }
            other => other?,
        }
        Ok(entry)
    }

    /// Deletes an entry from the cloud, then from the local cache. A local
    /// copy that is already gone is not an error.
    pub async fn delete_entry(&self, name: &str) -> SyncResult<()> {
        self.cloud.delete_entry(name).await?;
        match self.local.delete(name) {
            Err(LocalCacheError::NotFound(_)) => Ok(()),
            other => Ok(other?),
        }
    }
}
