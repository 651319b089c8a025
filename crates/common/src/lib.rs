//! Modular common utilities shared across nimbus crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: collections with no runtime requirements
//! - `runtime`: async infrastructure (resilience) built on tokio

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod collections;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use collections::{DedupCache, DEFAULT_DEDUP_CAPACITY};
#[cfg(feature = "runtime")]
pub use resilience::{BackoffCounter, BackoffError, BackoffStrategy};
