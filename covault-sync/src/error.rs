//! Reconciliation error types.

use crate::local::LocalCacheError;
use covault_cloud::StoreError;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced while merging the cloud snapshot into the local cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Local(#[from] LocalCacheError),

    #[error("entry meta key collides with a sync marker: {0}")]
    MetaKeyCollision(String),

    #[error("local entry is missing sync markers: {0}")]
    MissingMarkers(String),
}
