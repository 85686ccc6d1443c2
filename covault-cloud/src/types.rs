//! Blob value types exchanged with the remote store.

use serde::{Deserialize, Serialize};

/// The stored blob as the remote service holds it.
///
/// `meta` is the opaque clear header (signer id, signature, recipient key
/// slots); `value` is the payload ciphertext. `content_hash` is the server's
/// digest of `(meta, value)` and doubles as the optimistic-concurrency
/// precondition for the next write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub meta: Vec<u8>,
    pub value: Vec<u8>,
    pub version: u64,
    pub content_hash: Vec<u8>,
}

/// A fetched blob after verification and decryption: `value` holds the
/// plaintext payload, everything else is carried through unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedBlob {
    pub meta: Vec<u8>,
    pub value: Vec<u8>,
    pub version: u64,
    pub content_hash: Vec<u8>,
}
