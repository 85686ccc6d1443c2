//! Shared data model for Covault.
//!
//! The cloud blob decrypts to a map of named entries; this crate defines that
//! entry type and the map alias used by every other crate. Timestamps travel
//! as integer milliseconds so the serialized form is stable across platforms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Map of entry name to entry, as held in one decrypted blob.
///
/// A `BTreeMap` keeps serialization deterministic: two caches with the same
/// contents always produce byte-identical payloads.
pub type EntryMap = BTreeMap<String, Entry>;

/// One named secret in the store.
///
/// `name` is the unique key within a cache. `created_at` never moves after
/// the first store; `modified_at` is refreshed on every update and is always
/// `>= created_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub value: Vec<u8>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,
}

impl Entry {
    /// Creates a fresh entry, stamping creation and modification with the
    /// same instant.
    pub fn new(name: impl Into<String>, value: Vec<u8>, meta: Option<HashMap<String, String>>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            value,
            created_at: now,
            modified_at: now,
            meta,
        }
    }

    /// Returns an updated copy with new value and meta, preserving the
    /// creation timestamp and refreshing the modification timestamp.
    pub fn with_value(&self, value: Vec<u8>, meta: Option<HashMap<String, String>>) -> Self {
        Self {
            name: self.name.clone(),
            value,
            created_at: self.created_at,
            modified_at: Utc::now(),
            meta,
        }
    }
}
