//! Encrypted blob vault and cloud entry store for Covault.
//!
//! Provides the cloud half of the secret store:
//! - Sign-then-encrypt push/pull of the single vault blob
//! - Optimistic concurrency via the server's content hash
//! - Tamper detection on the server's write echo
//! - Single retry with forced token reload on authorization failure
//! - Name-keyed entry cache with one-push-cycle CRUD
//! - Recipient-set rotation that never strands the stored blob

pub mod blob_client;
pub mod entries;
pub mod entry_store;
pub mod error;
pub mod key_store;
pub mod token;
pub mod types;
pub mod vault;

pub use blob_client::{BlobClientConfig, HttpBlobClient, RemoteBlobClient};
pub use entry_store::{CloudEntryStore, NewEntry};
pub use error::{StoreError, StoreResult, VaultError, VaultResult};
pub use key_store::KeyEntryStore;
pub use token::{AuthToken, TokenContext, TokenOperation, TokenProvider};
pub use types::{DecryptedBlob, EncryptedBlob};
pub use vault::{RecipientSet, SecretVault};
