//! Client configuration structures
//!
//! Values here are plain data; loading from the environment or from files
//! lives in the infra crate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_INITIAL_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_MULTIPLIER,
    DEFAULT_BASE_URL, DEFAULT_MAX_REQUEST_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT,
};
use crate::errors::{NimbusError, Result};
use crate::utils::serde::duration_millis;

/// Top-level client configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every relative API path is joined onto.
    pub base_url: String,
    /// Bearer token; `None` sends unauthenticated requests.
    pub access_token: Option<String>,
    /// Attempt budget for requests built without an explicit one.
    pub max_request_attempts: u32,
    /// Connect and read timeout.
    #[serde(rename = "request_timeout_ms", with = "duration_millis")]
    pub request_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Delay policy between retries.
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            max_request_attempts: DEFAULT_MAX_REQUEST_ATTEMPTS,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("max_request_attempts", &self.max_request_attempts)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ClientConfig {
    /// Checks invariants the request engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`NimbusError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(NimbusError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.max_request_attempts == 0 {
            return Err(NimbusError::Config("max_request_attempts must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(NimbusError::Config("request_timeout_ms must be positive".into()));
        }
        if matches!(&self.access_token, Some(token) if token.trim().is_empty()) {
            return Err(NimbusError::Config("access_token must not be blank".into()));
        }
        self.backoff.validate()
    }
}

/// Exponential backoff parameters between retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay.
    pub initial_delay_ms: u64,
    /// Growth factor between delays.
    pub multiplier: f64,
    /// Upper bound on one delay.
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_BACKOFF_INITIAL_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl BackoffConfig {
    /// # Errors
    ///
    /// Returns [`NimbusError::Config`] when delays could shrink between
    /// retries.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(NimbusError::Config(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(NimbusError::Config(
                "backoff max_delay_ms must not be below initial_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_request_attempts, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            base_url = "http://localhost:8080/"
            request_timeout_ms = 1500

            [backoff]
            initial_delay_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.backoff.initial_delay_ms, 10);
        assert_eq!(config.backoff.max_delay_ms, DEFAULT_BACKOFF_MAX_MS);
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ClientConfig { base_url: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(NimbusError::Config(_))));

        config = ClientConfig { max_request_attempts: 0, ..Default::default() };
        assert!(config.validate().is_err());

        config = ClientConfig { access_token: Some("  ".into()), ..Default::default() };
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let config =
            ClientConfig { access_token: Some("secret-token".into()), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
