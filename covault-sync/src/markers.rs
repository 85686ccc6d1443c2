//! Sync marker bookkeeping.
//!
//! A vault-managed local entry carries its cloud timestamps as two meta
//! fields, encoded as millisecond strings. Entries lacking either marker
//! belong to the embedding application and are never touched by
//! reconciliation.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use covault_types::Entry;
use std::collections::HashMap;

/// Meta key holding the cloud creation timestamp (milliseconds).
pub const CREATION_MARKER: &str = "cv_ctime";

/// Meta key holding the cloud modification timestamp (milliseconds).
pub const MODIFICATION_MARKER: &str = "cv_mtime";

/// Builds the local meta map for a cloud entry: both markers plus the
/// entry's own meta. A user meta key that collides with a marker key is
/// rejected rather than silently overwritten.
pub fn for_entry(entry: &Entry) -> SyncResult<HashMap<String, String>> {
    let mut meta = HashMap::new();
    meta.insert(
        CREATION_MARKER.to_string(),
        entry.created_at.timestamp_millis().to_string(),
    );
    meta.insert(
        MODIFICATION_MARKER.to_string(),
        entry.modified_at.timestamp_millis().to_string(),
    );

    if let Some(user_meta) = &entry.meta {
        for (key, value) in user_meta {
            if meta.contains_key(key) {
                return Err(SyncError::MetaKeyCollision(key.clone()));
            }
            meta.insert(key.clone(), value.clone());
        }
    }

    Ok(meta)
}

/// Extracts `(created_at, modified_at)` from a local entry's meta. `None`
/// when either marker is missing or unparsable; the entry is then outside
/// reconciliation's scope.
pub fn parse(meta: Option<&HashMap<String, String>>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let meta = meta?;
    let created = parse_millis(meta.get(CREATION_MARKER)?)?;
    let modified = parse_millis(meta.get(MODIFICATION_MARKER)?)?;
    Some((created, modified))
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value.parse().ok()?)
}
