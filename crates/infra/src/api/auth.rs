//! API authentication
//!
//! The request executor asks an [`AccessTokenProvider`] for a bearer token
//! once per logical send. Token refresh is the provider's concern.

use std::fmt;

use async_trait::async_trait;

use super::errors::ApiError;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// Provider for a fixed developer token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Provider that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, ApiError> {
        if self.token.trim().is_empty() {
            return Err(ApiError::Auth("access token is empty".into()));
        }
        Ok(self.token.clone())
    }
}
