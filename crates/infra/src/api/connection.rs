//! Connection to the Nimbus API
//!
//! Couples the base URL with the [`RequestExecutor`] every component sends
//! through.

use std::sync::Arc;
use std::time::Duration;

use nimbus_common::resilience::BackoffStrategy;
use nimbus_domain::constants::{EVENTS_PATH, EVENT_PAGE_LIMIT};
use nimbus_domain::{BackoffConfig, ClientConfig, StreamPosition};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::auth::StaticTokenProvider;
use super::errors::ApiError;
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};

/// Base URL plus request executor.
#[derive(Debug, Clone)]
pub struct ApiConnection {
    base_url: Url,
    executor: RequestExecutor,
}

impl ApiConnection {
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, executor: RequestExecutor) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, executor })
    }

    /// Builds the executor and authenticator described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the configuration is invalid.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;

        let mut builder = RequestExecutor::builder()
            .timeout(config.request_timeout)
            .max_attempts(config.max_request_attempts)
            .backoff(backoff_strategy(&config.backoff))
            .user_agent(config.user_agent.clone());
        if let Some(token) = &config.access_token {
            builder = builder.auth(Arc::new(StaticTokenProvider::new(token.clone())));
        }

        Self::new(&config.base_url, builder.build()?)
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Executor every request goes through.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Resolves `path` against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// `events?limit=800&stream_position=<position>`
    pub fn events_url(&self, position: StreamPosition) -> Result<Url, ApiError> {
        let mut url = self.url(EVENTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("limit", &EVENT_PAGE_LIMIT.to_string())
            .append_pair("stream_position", &position.to_string());
        Ok(url)
    }

    /// Sends through the connection's executor.
    pub async fn send(
        &self,
        request: &mut ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.executor.send(request, cancel).await
    }
}

/// Exponential strategy described by a [`BackoffConfig`].
pub fn backoff_strategy(config: &BackoffConfig) -> BackoffStrategy {
    BackoffStrategy::Exponential {
        initial_delay: Duration::from_millis(config.initial_delay_ms),
        base: config.multiplier,
        max_delay: Duration::from_millis(config.max_delay_ms),
    }
}
