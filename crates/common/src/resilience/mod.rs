//! Resilience primitives for transient failures
//!
//! - **[`backoff`]**: per-operation attempt budget with cancellable,
//!   non-decreasing delays between attempts
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use nimbus_common::resilience::{BackoffCounter, BackoffStrategy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let mut counter = BackoffCounter::new(BackoffStrategy::Fixed(Duration::from_millis(10)));
//! let cancel = CancellationToken::new();
//! counter.reset(3);
//!
//! while counter.decrement() {
//!     if counter.wait_backoff(&cancel).await.is_err() {
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod backoff;

pub use backoff::{BackoffCounter, BackoffError, BackoffStrategy};
