//! The secret vault: push/pull/re-key orchestration over the encrypted blob.
//!
//! Every operation runs as a small stage graph (token acquisition, crypto,
//! network exchange) on the worker pool, wrapped in the single
//! retry-on-unauthorized policy. Operations on one vault instance are
//! serialized behind a private lock so the recipient set and the last-seen
//! content hash are never read or written mid-cycle.

use crate::blob_client::RemoteBlobClient;
use crate::error::{VaultError, VaultResult};
use crate::token::{AuthToken, TokenContext, TokenOperation, TokenProvider};
use crate::types::{DecryptedBlob, EncryptedBlob};
use covault_crypto::{BlobCrypto, PrivateKey, PublicKey};
use covault_pipeline::{retry_once_on, Stage};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type VStage<T> = Stage<T, VaultError>;

/// The key set a vault encrypts for and decrypts with.
///
/// `public_keys` are the encryption recipients and the trusted signer set;
/// `private_key` decrypts and signs. Never empty: construction and rotation
/// both reject an empty public key set.
#[derive(Clone)]
pub struct RecipientSet {
    public_keys: Vec<PublicKey>,
    private_key: PrivateKey,
}

impl RecipientSet {
    pub fn new(public_keys: Vec<PublicKey>, private_key: PrivateKey) -> VaultResult<Self> {
        if public_keys.is_empty() {
            return Err(VaultError::EmptyRecipients);
        }
        Ok(Self {
            public_keys,
            private_key,
        })
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Orchestrates encrypted blob exchange with the remote store.
pub struct SecretVault {
    crypto: Arc<dyn BlobCrypto>,
    client: Arc<dyn RemoteBlobClient>,
    tokens: Arc<dyn TokenProvider>,
    recipients: RwLock<RecipientSet>,
    /// Content hash of the last blob observed from the server.
    last_hash: RwLock<Option<Vec<u8>>>,
    /// Serializes pull/push/update_recipients on this instance.
    op_lock: Mutex<()>,
}

impl SecretVault {
    pub fn new(
        crypto: Arc<dyn BlobCrypto>,
        client: Arc<dyn RemoteBlobClient>,
        tokens: Arc<dyn TokenProvider>,
        recipients: RecipientSet,
    ) -> Self {
        Self {
            crypto,
            client,
            tokens,
            recipients: RwLock::new(recipients),
            last_hash: RwLock::new(None),
            op_lock: Mutex::new(()),
        }
    }

    /// The current recipient set (cloned snapshot).
    pub async fn recipient_set(&self) -> RecipientSet {
        self.recipients.read().await.clone()
    }

    /// Content hash of the last blob observed from the server, if any.
    /// This is the precondition token for the next optimistic write.
    pub async fn last_content_hash(&self) -> Option<Vec<u8>> {
        self.last_hash.read().await.clone()
    }

    /// Fetches and verify-decrypts the current blob.
    ///
    /// A store that has never been written fails with [`VaultError::EmptyStore`];
    /// callers must treat that as logically empty, not as a hard error.
    pub async fn pull(&self) -> VaultResult<DecryptedBlob> {
        let _guard = self.op_lock.lock().await;
        let result = self
            .with_auth_retry(|force| self.pull_cycle(force))
            .await;
        self.record_hash(&result).await;
        result
    }

    /// Encrypts `payload` under the current recipient set, uploads it with
    /// `previous_hash` as the concurrency precondition, and verify-decrypts
    /// the server's echo. An echo whose bytes differ from the upload fails
    /// with [`VaultError::ServerTampered`].
    pub async fn push(
        &self,
        payload: Vec<u8>,
        previous_hash: Option<Vec<u8>>,
    ) -> VaultResult<DecryptedBlob> {
        let _guard = self.op_lock.lock().await;
        let recipients = self.recipients.read().await.clone();
        let result = self
            .with_auth_retry(|force| {
                self.push_cycle(payload.clone(), previous_hash.clone(), recipients.clone(), force)
            })
            .await;
        self.record_hash(&result).await;
        result
    }

    /// Re-encrypts the stored blob under an updated recipient set.
    ///
    /// At least one of the two arguments must be supplied. The stored set is
    /// swapped only after the full pull/re-encrypt/push/decrypt cycle has
    /// succeeded, so a failed rotation leaves the vault able to decrypt
    /// whatever is actually stored.
    pub async fn update_recipients(
        &self,
        new_public_keys: Option<Vec<PublicKey>>,
        new_private_key: Option<PrivateKey>,
    ) -> VaultResult<DecryptedBlob> {
        let _guard = self.op_lock.lock().await;
        let current = self.recipients.read().await.clone();
        let next = merged_set(&current, new_public_keys, new_private_key)?;

        let result = self
            .with_auth_retry(|force| self.rekey_cycle(current.clone(), next.clone(), force))
            .await;

        if result.is_ok() {
            *self.recipients.write().await = next;
            debug!("recipient set rotated");
        }
        self.record_hash(&result).await;
        result
    }

    /// Re-keys a caller-supplied payload instead of the stored blob: encrypts
    /// `payload` under the updated set and pushes it with `previous_hash`.
    /// Used when the caller already holds the decrypted value.
    pub async fn update_recipients_with_value(
        &self,
        payload: Vec<u8>,
        previous_hash: Option<Vec<u8>>,
        new_public_keys: Option<Vec<PublicKey>>,
        new_private_key: Option<PrivateKey>,
    ) -> VaultResult<DecryptedBlob> {
        let _guard = self.op_lock.lock().await;
        let current = self.recipients.read().await.clone();
        let next = merged_set(&current, new_public_keys, new_private_key)?;

        let result = self
            .with_auth_retry(|force| {
                self.push_cycle(payload.clone(), previous_hash.clone(), next.clone(), force)
            })
            .await;

        if result.is_ok() {
            *self.recipients.write().await = next;
            debug!("recipient set rotated");
        }
        self.record_hash(&result).await;
        result
    }

    /// Applies the single-retry auth policy: one rerun with a forced token
    /// reload after an authorization failure; a second authorization failure
    /// surfaces as [`VaultError::AuthenticationFailed`]. Nothing else is
    /// ever retried.
    async fn with_auth_retry<T, F, Fut>(&self, op: F) -> VaultResult<T>
    where
        F: FnMut(bool) -> Fut,
        Fut: Future<Output = VaultResult<T>>,
    {
        let result = retry_once_on(
            |e: &VaultError| matches!(e, VaultError::Unauthorized(_)),
            op,
        )
        .await;
        match result {
            // The first 401 triggered the forced-reload rerun, so a 401 here
            // is the second in a row.
            Err(VaultError::Unauthorized(_)) => Err(VaultError::AuthenticationFailed),
            other => other,
        }
    }

    async fn record_hash(&self, result: &VaultResult<DecryptedBlob>) {
        if let Ok(blob) = result {
            *self.last_hash.write().await = Some(blob.content_hash.clone());
        }
    }

    fn token_stage(&self, operation: TokenOperation, force: bool) -> VStage<AuthToken> {
        let tokens = self.tokens.clone();
        Stage::spawn(async move {
            let context = TokenContext {
                operation,
                force_reload: force,
            };
            tokens.get_token(&context).await
        })
    }

    async fn pull_cycle(&self, force: bool) -> VaultResult<DecryptedBlob> {
        let recipients = self.recipients.read().await.clone();
        let client = self.client.clone();
        let crypto = self.crypto.clone();

        let token = self.token_stage(TokenOperation::Get, force);

        let t = token.get();
        let fetched: VStage<EncryptedBlob> = Stage::spawn(async move {
            let token = t.await?;
            client.fetch(&token).await
        });

        let f = fetched.get();
        let decrypted: VStage<DecryptedBlob> = Stage::spawn(async move {
            let blob = f.await?;
            decrypt_blob(crypto.as_ref(), blob, &recipients)
        });

        match decrypted.join().await {
            Err(VaultError::BlobNotFound) => Err(VaultError::EmptyStore),
            other => other,
        }
    }

    async fn push_cycle(
        &self,
        payload: Vec<u8>,
        previous_hash: Option<Vec<u8>>,
        recipients: RecipientSet,
        force: bool,
    ) -> VaultResult<DecryptedBlob> {
        let client = self.client.clone();
        let crypto = self.crypto.clone();
        let decrypt_crypto = self.crypto.clone();
        let decrypt_recipients = recipients.clone();

        let token = self.token_stage(TokenOperation::Put, force);
        let input: VStage<Vec<u8>> = Stage::ready(payload);

        // Encryption runs concurrently with token acquisition.
        let p = input.get();
        let encrypted: VStage<(Vec<u8>, Vec<u8>)> = Stage::spawn(async move {
            let payload = p.await?;
            Ok(crypto.sign_then_encrypt(
                &payload,
                recipients.private_key(),
                recipients.public_keys(),
            )?)
        });

        let (t, e) = (token.get(), encrypted.get());
        let uploaded: VStage<EncryptedBlob> = Stage::spawn(async move {
            let token = t.await?;
            let (meta, value) = e.await?;
            let echoed = client
                .replace(&meta, &value, previous_hash.as_deref(), &token)
                .await?;
            // The server must store exactly what was uploaded; anything else
            // is a tampered or corrupted write and is never retried.
            if echoed.meta != meta || echoed.value != value {
                return Err(VaultError::ServerTampered);
            }
            Ok(echoed)
        });

        let u = uploaded.get();
        let decrypted: VStage<DecryptedBlob> = Stage::spawn(async move {
            let blob = u.await?;
            decrypt_blob(decrypt_crypto.as_ref(), blob, &decrypt_recipients)
        });

        decrypted.join().await
    }

    async fn rekey_cycle(
        &self,
        current: RecipientSet,
        next: RecipientSet,
        force: bool,
    ) -> VaultResult<DecryptedBlob> {
        let client = self.client.clone();
        let pull_crypto = self.crypto.clone();
        let encrypt_crypto = self.crypto.clone();
        let echo_crypto = self.crypto.clone();
        let encrypt_set = next.clone();
        let echo_set = next.clone();

        // One put-scoped token covers both the pull and the push.
        let token = self.token_stage(TokenOperation::Put, force);

        let t = token.get();
        let fetched: VStage<EncryptedBlob> = Stage::spawn(async move {
            let token = t.await?;
            client.fetch(&token).await
        });

        // Decrypt with the *current* set.
        let f = fetched.get();
        let pulled: VStage<DecryptedBlob> = Stage::spawn(async move {
            let blob = f.await?;
            decrypt_blob(pull_crypto.as_ref(), blob, &current)
        });

        // Re-encrypt the same payload under the *new* set.
        let d = pulled.get();
        let encrypted: VStage<(Vec<u8>, Vec<u8>)> = Stage::spawn(async move {
            let blob = d.await?;
            Ok(encrypt_crypto.sign_then_encrypt(
                &blob.value,
                encrypt_set.private_key(),
                encrypt_set.public_keys(),
            )?)
        });

        let client2 = self.client.clone();
        let (t2, d2, e2) = (token.get(), pulled.get(), encrypted.get());
        let uploaded: VStage<EncryptedBlob> = Stage::spawn(async move {
            let token = t2.await?;
            let previous = d2.await?;
            let (meta, value) = e2.await?;
            let echoed = client2
                .replace(&meta, &value, Some(previous.content_hash.as_slice()), &token)
                .await?;
            if echoed.meta != meta || echoed.value != value {
                return Err(VaultError::ServerTampered);
            }
            Ok(echoed)
        });

        // Confirm the new set can read what was just written.
        let u = uploaded.get();
        let confirmed: VStage<DecryptedBlob> = Stage::spawn(async move {
            let blob = u.await?;
            decrypt_blob(echo_crypto.as_ref(), blob, &echo_set)
        });

        match confirmed.join().await {
            Err(VaultError::BlobNotFound) => Err(VaultError::EmptyStore),
            other => other,
        }
    }
}

fn decrypt_blob(
    crypto: &dyn BlobCrypto,
    blob: EncryptedBlob,
    recipients: &RecipientSet,
) -> VaultResult<DecryptedBlob> {
    let payload = crypto.verify_then_decrypt(
        &blob.meta,
        &blob.value,
        recipients.private_key(),
        recipients.public_keys(),
    )?;
    Ok(DecryptedBlob {
        meta: blob.meta,
        value: payload,
        version: blob.version,
        content_hash: blob.content_hash,
    })
}

fn merged_set(
    current: &RecipientSet,
    new_public_keys: Option<Vec<PublicKey>>,
    new_private_key: Option<PrivateKey>,
) -> VaultResult<RecipientSet> {
    if let Some(keys) = &new_public_keys {
        if keys.is_empty() {
            return Err(VaultError::EmptyRecipients);
        }
    }
    if new_public_keys.is_none() && new_private_key.is_none() {
        return Err(VaultError::KeysNotUpdated);
    }
    RecipientSet::new(
        new_public_keys.unwrap_or_else(|| current.public_keys.clone()),
        new_private_key.unwrap_or_else(|| current.private_key.clone()),
    )
}
