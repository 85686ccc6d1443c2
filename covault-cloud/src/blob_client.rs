//! Remote blob transport.
//!
//! The remote service stores exactly one blob per vault and enforces
//! optimistic concurrency: a replace carries the hash of the blob the writer
//! last observed, and the service rejects the write if the stored hash has
//! moved on. The HTTP client maps those protocol outcomes onto typed errors;
//! retry policy lives a layer up in the vault.

use crate::error::{VaultError, VaultResult};
use crate::token::AuthToken;
use crate::types::EncryptedBlob;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Network capability to fetch and replace the stored blob.
#[async_trait]
pub trait RemoteBlobClient: Send + Sync {
    /// Fetches the current blob. Fails `BlobNotFound` if nothing has ever
    /// been written.
    async fn fetch(&self, token: &AuthToken) -> VaultResult<EncryptedBlob>;

    /// Replaces the stored blob, with `previous_hash` as the optimistic
    /// concurrency precondition (`None` on first write). Returns the blob
    /// as the server now holds it.
    async fn replace(
        &self,
        meta: &[u8],
        value: &[u8],
        previous_hash: Option<&[u8]>,
        token: &AuthToken,
    ) -> VaultResult<EncryptedBlob>;
}

/// Configuration for the HTTP blob client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobClientConfig {
    /// Base URL of the vault service (e.g., "https://vault.example.com").
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BlobClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://vault.covault.io".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP implementation of [`RemoteBlobClient`].
pub struct HttpBlobClient {
    client: reqwest::Client,
    config: BlobClientConfig,
}

#[derive(Serialize)]
struct ReplaceRequest {
    meta: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_hash: Option<String>,
}

#[derive(Deserialize)]
struct BlobResponse {
    meta: String,
    value: String,
    version: u64,
    hash: String,
}

impl HttpBlobClient {
    pub fn new(config: BlobClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self { client, config }
    }

    fn blob_url(&self) -> String {
        format!("{}/v1/vault/blob", self.config.base_url)
    }

    fn decode_blob(resp: BlobResponse) -> VaultResult<EncryptedBlob> {
        Ok(EncryptedBlob {
            meta: decode_b64("meta", &resp.meta)?,
            value: decode_b64("value", &resp.value)?,
            version: resp.version,
            content_hash: decode_b64("hash", &resp.hash)?,
        })
    }
}

fn decode_b64(field: &str, value: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| VaultError::Serialization(format!("invalid {field} encoding: {e}")))
}

#[async_trait]
impl RemoteBlobClient for HttpBlobClient {
    async fn fetch(&self, token: &AuthToken) -> VaultResult<EncryptedBlob> {
        let resp = self
            .client
            .get(self.blob_url())
            .bearer_auth(token.as_str())
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => return Err(VaultError::BlobNotFound),
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(VaultError::Unauthorized("fetch rejected".to_string()));
            }
            _ => {}
        }

        let resp: BlobResponse = resp
            .error_for_status()
            .map_err(|e| VaultError::Transport(e.to_string()))?
            .json()
            .await?;

        Self::decode_blob(resp)
    }

    async fn replace(
        &self,
        meta: &[u8],
        value: &[u8],
        previous_hash: Option<&[u8]>,
        token: &AuthToken,
    ) -> VaultResult<EncryptedBlob> {
        let body = ReplaceRequest {
            meta: STANDARD.encode(meta),
            value: STANDARD.encode(value),
            previous_hash: previous_hash.map(|h| STANDARD.encode(h)),
        };

        let resp = self
            .client
            .put(self.blob_url())
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            reqwest::StatusCode::CONFLICT => {
                debug!("replace rejected: stale precondition hash");
                return Err(VaultError::Conflict);
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(VaultError::Unauthorized("replace rejected".to_string()));
            }
            _ => {}
        }

        let resp: BlobResponse = resp
            .error_for_status()
            .map_err(|e| VaultError::Transport(e.to_string()))?
            .json()
            .await?;

        Self::decode_blob(resp)
    }
}
