//! Nimbus API plumbing
//!
//! - **[`auth`]**: bearer token providers
//! - **[`connection`]**: base URL + request executor
//! - **[`errors`]**: error taxonomy with retry classification

pub mod auth;
pub mod connection;
pub mod errors;

pub use auth::{AccessTokenProvider, StaticTokenProvider};
pub use connection::{backoff_strategy, ApiConnection};
pub use errors::{ApiError, ApiErrorCategory};
