//! Vault and entry-store error types.

use covault_crypto::CryptoError;
use covault_pipeline::StagePanic;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while pushing, pulling, or re-keying the blob.
///
/// Every variant is `Clone`: operation graphs fan stage results out through
/// shared futures, so foreign errors are carried as strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("recipient public key set is empty")]
    EmptyRecipients,

    #[error("neither new public keys nor a new private key was supplied")]
    KeysNotUpdated,

    #[error("remote store has never been written")]
    EmptyStore,

    #[error("no blob stored for this vault")]
    BlobNotFound,

    #[error("server echoed a blob that differs from the uploaded bytes")]
    ServerTampered,

    #[error("remote rejected the precondition hash as stale")]
    Conflict,

    #[error("authorization rejected: {0}")]
    Unauthorized(String),

    #[error("authentication failed after forced token reload")]
    AuthenticationFailed,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("pipeline stage panicked: {0}")]
    StagePanicked(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::Transport(e.to_string())
    }
}

impl From<StagePanic> for VaultError {
    fn from(p: StagePanic) -> Self {
        VaultError::StagePanicked(p.0)
    }
}

/// Result type for entry-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the cloud entry store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entry already exists: {0}")]
    EntryAlreadyExists(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
