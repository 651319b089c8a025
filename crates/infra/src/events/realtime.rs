//! Long-poll connection to one real-time endpoint
//!
//! A [`RealtimeServerConnection`] owns the retry budget advertised with its
//! endpoint. Each long poll that fails at the connection level (most often a
//! timeout while the server holds the request) consumes one retry and is
//! followed by a cancellable backoff wait, so an unreachable host is never
//! hammered. Once the budget is spent the poller discards the connection and
//! discovers a new endpoint.

use std::sync::Arc;
use std::time::Duration;

use nimbus_common::resilience::BackoffCounter;
use nimbus_domain::constants::LONG_POLL_TIMEOUT_GRACE_MS;
use nimbus_domain::{LongPollMessage, RealtimeEndpoint, StreamPosition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::discovery::discover_endpoint;
use crate::api::{ApiConnection, ApiError};
use crate::http::ApiRequest;

/// Result of a single long poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPollOutcome {
    /// The server answered; events should be fetched.
    Changed(LongPollMessage),
    /// The poll failed or timed out and retries remain.
    TimedOut,
    /// No retries remain on this endpoint.
    Exhausted,
}

/// Long-poll client for one discovered endpoint.
#[derive(Debug)]
pub struct RealtimeServerConnection {
    connection: Arc<ApiConnection>,
    endpoint: RealtimeEndpoint,
    retries: BackoffCounter,
}

impl RealtimeServerConnection {
    /// Wraps an endpoint. A zero retry budget is treated as one.
    ///
    /// Waits between failed polls follow the connection's backoff strategy.
    pub fn new(connection: Arc<ApiConnection>, endpoint: RealtimeEndpoint) -> Self {
        let mut retries = BackoffCounter::new(connection.executor().backoff().clone());
        retries.reset(endpoint.max_retries.max(1));
        Self { connection, endpoint, retries }
    }

    /// Runs discovery and wraps the first endpoint offered.
    pub async fn discover(
        connection: Arc<ApiConnection>,
        cancel: &CancellationToken,
    ) -> Result<Self, ApiError> {
        let endpoint = discover_endpoint(&connection, cancel).await?;
        Ok(Self::new(connection, endpoint))
    }

    /// Endpoint this connection polls.
    pub fn endpoint(&self) -> &RealtimeEndpoint {
        &self.endpoint
    }

    /// Long polls this endpoint may still fail before it is discarded.
    pub fn remaining_retries(&self) -> u32 {
        self.retries.attempts_remaining()
    }

    /// Blocks until the service reports a change or the retry budget is
    /// spent.
    ///
    /// Returns `true` when events should be fetched and `false` when a new
    /// endpoint must be discovered.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Cancelled`] if `cancel` fires during a poll or a
    /// backoff wait, or any
    /// non-connection failure from the long-poll request.
    pub async fn wait_for_change(
        &mut self,
        position: StreamPosition,
        cancel: &CancellationToken,
    ) -> Result<bool, ApiError> {
        loop {
            match self.poll(position, cancel).await? {
                LongPollOutcome::Changed(_) => return Ok(true),
                LongPollOutcome::TimedOut => continue,
                LongPollOutcome::Exhausted => return Ok(false),
            }
        }
    }

    /// Issues one long poll at `position`.
    ///
    /// A connection-level failure spends one retry and then backs off before
    /// returning, whether or not retries remain.
    #[instrument(skip(self, cancel), fields(remaining = self.remaining_retries()))]
    pub async fn poll(
        &mut self,
        position: StreamPosition,
        cancel: &CancellationToken,
    ) -> Result<LongPollOutcome, ApiError> {
        if self.remaining_retries() == 0 {
            return Ok(LongPollOutcome::Exhausted);
        }

        let url = Url::parse(&self.endpoint.long_poll_url(position))?;
        let mut request = ApiRequest::get(url).timeout(self.request_timeout()).max_attempts(1);

        match self.connection.send(&mut request, cancel).await {
            Ok(response) => {
                let message = LongPollMessage::from_wire(
                    response.json().and_then(|json| json.get("message")).and_then(|m| m.as_str()),
                );
                debug!(?message, "long poll completed");
                if message == LongPollMessage::Reconnect {
                    self.retries.reset(0);
                }
                Ok(LongPollOutcome::Changed(message))
            }
            Err(ApiError::Status { status, .. }) => {
                debug!(status, "long poll answered with an error status");
                Ok(LongPollOutcome::Changed(LongPollMessage::Other))
            }
            Err(ApiError::Connection(reason)) => {
                let retry = self.retries.decrement();
                warn!(remaining = self.remaining_retries(), %reason, "long poll failed");
                self.retries.wait_backoff(cancel).await?;
                if retry {
                    Ok(LongPollOutcome::TimedOut)
                } else {
                    Ok(LongPollOutcome::Exhausted)
                }
            }
            Err(err) => Err(err),
        }
    }

    fn request_timeout(&self) -> Duration {
        self.endpoint.retry_timeout + Duration::from_millis(LONG_POLL_TIMEOUT_GRACE_MS)
    }
}
