//! Error types used throughout the domain layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for nimbus domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum NimbusError {
    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied value out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A wire payload did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for NimbusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for nimbus domain operations
pub type Result<T> = std::result::Result<T, NimbusError>;
