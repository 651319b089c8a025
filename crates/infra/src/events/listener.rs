//! Event stream listeners

use nimbus_domain::Event;

use crate::api::ApiError;

/// Receives events and failures from an [`EventStream`](super::EventStream).
///
/// Callbacks run synchronously on the poller task while the stream's
/// delivery lock is held, so a slow listener delays the next fetch. They must
/// not call back into the stream's `add_listener`.
pub trait EventListener: Send + Sync {
    /// Called once per delivered event, in stream order.
    fn on_event(&self, event: &Event);

    /// Offered a failure that stopped the stream. Returning `true` marks it
    /// handled and keeps it from later listeners.
    fn on_exception(&self, error: &ApiError) -> bool {
        let _ = error;
        false
    }
}
