//! Specialized data structures
//!
//! - **[`dedup_cache`]**: bounded insertion-ordered set used to drop
//!   duplicate identifiers
//!
//! ## Usage
//!
//! ```rust
//! use nimbus_common::collections::DedupCache;
//!
//! let mut seen = DedupCache::new(512);
//! if seen.insert("event-1".to_string()) {
//!     // first sighting, deliver it
//! }
//! ```

pub mod dedup_cache;

pub use dedup_cache::{DedupCache, DEFAULT_DEDUP_CAPACITY};
