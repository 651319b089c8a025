//! Domain types and models
//!
//! - **[`events`]**: events, stream positions, event pages
//! - **[`realtime`]**: long-poll endpoint description

pub mod events;
pub mod realtime;

pub use events::{Event, EventPage, EventType, ResourceKind, ResourceRef, StreamPosition};
pub use realtime::{LongPollMessage, RealtimeDiscovery, RealtimeEndpoint};
