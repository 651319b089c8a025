//! Domain utilities
//!
//! - **[`serde`]**: serialization helpers for wire and config payloads

pub mod serde;

pub use self::serde::{duration_millis, lenient_u32};
