//! Bearer-token acquisition seam.

use crate::error::VaultResult;
use async_trait::async_trait;

/// Opaque bearer token string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which remote operation a token is being requested for; issuers may scope
/// tokens differently for reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenOperation {
    Get,
    Put,
}

impl TokenOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenOperation::Get => "get",
            TokenOperation::Put => "put",
        }
    }
}

/// Context passed to the token provider on every acquisition.
#[derive(Clone, Debug)]
pub struct TokenContext {
    pub operation: TokenOperation,
    /// Set on the single retry after an authorization failure; providers
    /// must bypass any cached token when this is true.
    pub force_reload: bool,
}

/// Issues bearer tokens for vault operations. Supplied by the embedding
/// application; the vault never caches tokens itself.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, context: &TokenContext) -> VaultResult<AuthToken>;
}
