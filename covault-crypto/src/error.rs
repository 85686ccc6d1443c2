//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening a blob.
///
/// All variants carry owned strings so the type stays `Clone`; vault
/// operations fan results out through shared futures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("recipient public key set is empty")]
    NoRecipients,

    #[error("no recipient slot matches the supplied private key")]
    RecipientNotFound,

    #[error("no public key matches the embedded signer id")]
    SignerNotFound,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed blob header: {0}")]
    Malformed(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
