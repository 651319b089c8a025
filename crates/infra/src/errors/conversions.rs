//! Conversions from external infrastructure errors into [`ApiError`].

use nimbus_common::resilience::BackoffError;
use nimbus_domain::NimbusError;
use reqwest::Error as HttpError;

use crate::api::ApiError;

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            return Self::Connection(format!("HTTP request timed out: {err}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return Self::Connection(format!("HTTP connection failure: {err}"));
        }

        if let Some(status) = err.status() {
            return Self::Status { status: status.as_u16(), body: String::new() };
        }

        if err.is_builder() {
            return Self::Config(format!("invalid HTTP request: {err}"));
        }

        if err.is_decode() {
            return Self::InvalidResponse(format!("failed to decode response body: {err}"));
        }

        Self::Connection(err.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* NimbusError → ApiError */
/* -------------------------------------------------------------------------- */

impl From<NimbusError> for ApiError {
    fn from(err: NimbusError) -> Self {
        match err {
            NimbusError::Config(msg) | NimbusError::InvalidInput(msg) => Self::Config(msg),
            NimbusError::Parse(msg) => Self::InvalidResponse(msg),
            NimbusError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* BackoffError → ApiError */
/* -------------------------------------------------------------------------- */

impl From<BackoffError> for ApiError {
    fn from(err: BackoffError) -> Self {
        match err {
            BackoffError::Cancelled { .. } => Self::Cancelled,
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {err}"))
    }
}
