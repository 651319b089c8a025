//! Real-time event stream
//!
//! - **[`discovery`]**: finds a long-poll endpoint (`OPTIONS events`)
//! - **[`realtime`]**: long-poll connection with its own retry budget
//! - **[`listener`]**: callbacks for events and failures
//! - **[`dedup`]**: pluggable duplicate suppression
//! - **[`stream`]**: lifecycle, fan-out, failure propagation

pub mod dedup;
pub mod discovery;
pub mod listener;
mod poller;
pub mod realtime;
pub mod stream;

pub use dedup::{DuplicateFilter, NoDedup};
pub use discovery::discover_endpoint;
pub use listener::EventListener;
pub use realtime::{LongPollOutcome, RealtimeServerConnection};
pub use stream::EventStream;
