//! Local cache reconciliation for Covault.
//!
//! Keeps an OS-backed local store in step with the cloud entry snapshot:
//! one-pass delete/add/compare merges with per-entry modification
//! timestamps, cloud-first write-through for mutations, and marker-based
//! scoping so entries the application manages itself are never touched.

pub mod error;
pub mod local;
pub mod markers;
pub mod reconciler;

pub use error::{SyncError, SyncResult};
pub use local::{
    InMemoryLocalCache, LocalCacheError, LocalEntry, LocalPersistentCache, LocalResult,
    ScopedLocalCache,
};
pub use reconciler::LocalReconciler;
