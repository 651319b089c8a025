//! Typed responses
//!
//! Successful responses are classified by content type: JSON bodies are
//! parsed eagerly, everything else is kept as raw bytes.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::api::ApiError;

/// Response whose body was parsed as JSON.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    /// HTTP status, always 2xx.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Parsed body.
    pub json: Value,
}

/// Response with an opaque body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status, always 2xx.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body bytes as received.
    pub body: Vec<u8>,
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    /// Body parsed as JSON.
    Json(JsonResponse),
    /// Empty, non-JSON or unparseable body.
    Raw(RawResponse),
}

impl ApiResponse {
    /// Reads the body and classifies a 2xx response.
    ///
    /// A JSON content type whose body does not parse degrades to
    /// [`ApiResponse::Raw`].
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if is_json(&headers) && !body.is_empty() {
            match serde_json::from_slice(&body) {
                Ok(json) => return Ok(Self::Json(JsonResponse { status, headers, json })),
                Err(err) => warn!(%status, error = %err, "JSON response body did not parse"),
            }
        }

        Ok(Self::Raw(RawResponse { status, headers, body }))
    }

    /// HTTP status of either variant.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json(response) => response.status,
            Self::Raw(response) => response.status,
        }
    }

    /// Headers of either variant.
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::Json(response) => &response.headers,
            Self::Raw(response) => &response.headers,
        }
    }

    /// Parsed body, if the response was JSON.
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(response) => Some(&response.json),
            Self::Raw(_) => None,
        }
    }

    /// Deserializes a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidResponse`] for non-JSON responses or when
    /// the body does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Self::Json(response) => serde_json::from_value(response.json)
                .map_err(|e| ApiError::InvalidResponse(format!("unexpected JSON shape: {e}"))),
            Self::Raw(response) => Err(ApiError::InvalidResponse(format!(
                "expected a JSON response, got {} bytes of {}",
                response.body.len(),
                content_type(&response.headers).unwrap_or("unknown content")
            ))),
        }
    }
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
}

fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
    })
}
