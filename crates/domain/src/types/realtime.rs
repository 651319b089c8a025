//! Real-time (long-poll) endpoint description

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::events::StreamPosition;
use crate::utils::serde::{duration_millis, lenient_u32};

/// Long-poll endpoint advertised by the discovery call.
///
/// `retry_timeout` is how long one long poll may stay open on the server
/// before it answers with a timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeEndpoint {
    /// Long-poll URL, may already carry a query.
    pub url: String,
    /// Failed polls allowed before rediscovery.
    #[serde(with = "lenient_u32")]
    pub max_retries: u32,
    /// Time the server may hold a poll open.
    #[serde(with = "duration_millis")]
    pub retry_timeout: Duration,
}

impl RealtimeEndpoint {
    /// Long-poll URL for waiting on changes after `position`.
    ///
    /// The advertised URL usually carries its own query string already.
    pub fn long_poll_url(&self, position: StreamPosition) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}stream_position={position}", self.url)
    }
}

/// Body of the discovery response: a list of endpoints, first one wins.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeDiscovery {
    /// Offered endpoints, best first.
    #[serde(default)]
    pub entries: Vec<RealtimeEndpoint>,
}

/// Message carried by a completed long poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPollMessage {
    /// `new_change`: events are waiting.
    NewChange,
    /// `reconnect`: the endpoint wants clients to rediscover.
    Reconnect,
    /// Anything else, including no message at all.
    Other,
}

impl LongPollMessage {
    /// Maps the `message` field of a long-poll response.
    pub fn from_wire(message: Option<&str>) -> Self {
        match message {
            Some(m) if m.eq_ignore_ascii_case("new_change") => Self::NewChange,
            Some(m) if m.eq_ignore_ascii_case("reconnect") => Self::Reconnect,
            _ => Self::Other,
        }
    }
}
