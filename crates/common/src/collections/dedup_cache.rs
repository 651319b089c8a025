//! A bounded, insertion-ordered set for suppressing duplicate identifiers.
//!
//! [`DedupCache`] remembers the most recent `capacity` distinct keys it has
//! seen. Keys are kept in a fixed-capacity ring (oldest at the front) with a
//! companion hash set for constant-time membership. When a new key arrives and
//! the cache is full, the key inserted longest ago is evicted, regardless of
//! how recently it was looked up: eviction follows insertion order, not access
//! order.
//!
//! # Complexity
//! - [`insert`](DedupCache::insert), [`contains`](DedupCache::contains) and
//!   eviction are **O(1)** on average.
//!
//! # Thread Safety
//! - No interior mutability. Callers that share a cache wrap it in a mutex so
//!   the test-and-insert in [`insert`](DedupCache::insert) stays atomic.

use std::borrow::Borrow;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Default number of identifiers remembered by an event stream.
pub const DEFAULT_DEDUP_CAPACITY: usize = 512;

/// Fixed-capacity set that evicts its oldest-inserted key when full.
///
/// # Examples
///
/// ```rust
/// use nimbus_common::collections::DedupCache;
///
/// let mut cache = DedupCache::new(2);
/// assert!(cache.insert("a"));
/// assert!(!cache.insert("a")); // duplicate
/// assert!(cache.insert("b"));
/// assert!(cache.insert("c")); // evicts "a"
///
/// assert!(!cache.contains(&"a"));
/// assert!(cache.contains(&"b"));
/// ```
#[derive(Clone, Debug)]
pub struct DedupCache<K> {
    order: VecDeque<K>,
    members: HashSet<K>,
    capacity: usize,
}

impl<K> DedupCache<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache holding at most `capacity` keys.
    ///
    /// A capacity of zero is clamped to `1`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Records `key` and reports whether it was new.
    ///
    /// Returns `false` without touching the eviction order when `key` is
    /// already present. Otherwise the key is appended and, if that pushes the
    /// cache past its capacity, the oldest-inserted key is evicted.
    pub fn insert(&mut self, key: K) -> bool {
        if self.members.contains(&key) {
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }

        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Returns `true` if `key` is currently remembered.
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.members.contains(key)
    }

    /// Number of keys currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of keys remembered at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The key that will be evicted next, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<&K> {
        self.order.front()
    }

    /// Forgets every key, keeping the capacity.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Iterates keys from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}

impl<K> Default for DedupCache<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
