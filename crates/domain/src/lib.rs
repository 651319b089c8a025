//! # Nimbus Domain
//!
//! Data types shared by the Nimbus request engine and event stream.
//!
//! This crate contains:
//! - Event, stream position and real-time endpoint types
//! - Domain error types and Result definitions
//! - Client configuration structures
//! - Wire-level constants and defaults
//!
//! ## Architecture
//! - No dependencies on other Nimbus crates
//! - Only external dependencies allowed
//! - Pure data, no I/O

#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

pub use config::{BackoffConfig, ClientConfig};
pub use errors::*;
pub use types::*;
