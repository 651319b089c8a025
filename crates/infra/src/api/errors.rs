//! API-specific error types
//!
//! Provides error classification for requests and the event stream, with the
//! retry decision the request executor relies on.

use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, missing token) - non-retryable
    Authentication,
    /// Rate limiting (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth and 429) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Misuse of the API surface (bad config, illegal state) - non-retryable
    Usage,
    /// Cooperative shutdown
    Cancelled,
    /// Unexpected payloads or internal faults - non-retryable
    Internal,
}

/// Errors raised by the request executor and the event stream
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// I/O-level failure: refused connection, reset, timeout.
    #[error("Connection failure: {0}")]
    Connection(String),

    /// The service answered with a non-2xx status.
    #[error("API error {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// A request body was consumed by an earlier send and cannot be rewound.
    #[error("Request body cannot be reset for another attempt")]
    BodyNotResettable,

    /// Lifecycle misuse, such as stopping a stream that isn't started.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// No usable access token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid client or HTTP configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service answered, but not with the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Bug or panic inside the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Connection(_) => ApiErrorCategory::Network,
            Self::Status { status, .. } => match *status {
                401 | 403 => ApiErrorCategory::Authentication,
                429 => ApiErrorCategory::RateLimit,
                500.. => ApiErrorCategory::Server,
                _ => ApiErrorCategory::Client,
            },
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::BodyNotResettable | Self::IllegalState(_) | Self::Config(_) => {
                ApiErrorCategory::Usage
            }
            Self::Cancelled => ApiErrorCategory::Cancelled,
            Self::InvalidResponse(_) | Self::Internal(_) => ApiErrorCategory::Internal,
        }
    }

    /// Whether another attempt may succeed: connection failures, any status
    /// of 500 and above, and 429.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Network | ApiErrorCategory::Server | ApiErrorCategory::RateLimit
        )
    }

    /// HTTP status carried by the error, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is [`ApiError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
