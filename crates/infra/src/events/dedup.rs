//! Duplicate suppression for at-least-once delivery

use nimbus_common::collections::DedupCache;

/// Decides whether an event id is delivered.
///
/// Implementations are called under the stream's delivery lock, so the
/// check and the insert are atomic with respect to other deliveries.
pub trait DuplicateFilter: Send {
    /// Records `id` and returns `true` if it has not been seen recently.
    fn first_sighting(&mut self, id: &str) -> bool;
}

impl DuplicateFilter for DedupCache<String> {
    fn first_sighting(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.insert(id.to_owned())
    }
}

/// Filter that lets every event through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDedup;

impl DuplicateFilter for NoDedup {
    fn first_sighting(&mut self, _id: &str) -> bool {
        true
    }
}
