//! # Nimbus Infrastructure
//!
//! All I/O for the Nimbus client.
//!
//! This crate contains:
//! - The retrying HTTP request executor
//! - API connection, authentication and error taxonomy
//! - The long-polling real-time event stream
//! - Configuration loading from environment and files
//!
//! ## Architecture
//! - Depends on `nimbus-common` and `nimbus-domain`
//! - Async on tokio; every blocking call takes a `CancellationToken`
//! - Logs through `tracing` only; binaries install the subscriber

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod http;

// Re-export commonly used items
pub use api::{AccessTokenProvider, ApiConnection, ApiError, StaticTokenProvider};
pub use events::{EventListener, EventStream};
pub use http::{ApiRequest, ApiResponse, RequestExecutor};
