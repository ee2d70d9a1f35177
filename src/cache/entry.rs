//! Cache Entry Module
//!
//! Defines the immutable snapshot stored per key.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single cache entry: key, value, and creation time.
///
/// Entries are immutable once stored. Overwriting a key creates a new entry
/// with a fresh creation time and a fresh stamp; the old entry is discarded
/// as a whole.
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    /// The key this entry is stored under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Creation timestamp
    pub created_at: Instant,
    /// Identity correlating this entry with its eviction-order handle
    pub stamp: u64,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates a new entry stamped with the given order handle identity.
    pub fn new(key: K, value: V, stamp: u64) -> Self {
        Self {
            key,
            value,
            created_at: Instant::now(),
            stamp,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived the cache-wide TTL.
    ///
    /// A zero TTL means entries never expire by age. Expiry is strict: the
    /// entry is expired only once its age exceeds the TTL.
    pub fn is_expired(&self, time_to_live: Duration, now: Instant) -> bool {
        !time_to_live.is_zero() && now.duration_since(self.created_at) > time_to_live
    }

    /// Age of the entry at the given instant.
    pub fn age(&self, now: Instant) -> Duration {
        now.duration_since(self.created_at)
    }
}
