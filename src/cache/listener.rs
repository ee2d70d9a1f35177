//! Cache Listener Module
//!
//! Capability traits for observing cache activity and selecting entries.

use std::hash::Hash;

use super::store::BoundedCache;

/// Error type listeners may raise during notification.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for listener callbacks.
pub type ListenerResult = std::result::Result<(), ListenerError>;

// == Cache Key ==
/// Requirements on cache keys.
///
/// Beyond hashing and equality, a key type reports whether a given key is
/// blank (carries no identity). Blank keys are rejected by mutating
/// operations and treated as a plain miss on reads, so an unkeyed value can
/// never be stored or removed. Most key types have no blank form.
pub trait CacheKey: Eq + Hash + Clone {
    /// Whether this key carries no identity.
    fn is_blank(&self) -> bool {
        false
    }
}

impl CacheKey for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl CacheKey for &str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! impl_cache_key_for_int {
    ($($ty:ty),*) => {
        $(impl CacheKey for $ty {})*
    };
}

impl_cache_key_for_int!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

// == Cache Listener ==
/// Observer of cache activity.
///
/// Zero or more listeners may be registered on a cache. For every
/// successful operation outcome the cache invokes the matching callback
/// synchronously on the calling thread, in registration order, after the
/// mutation has committed and the internal lock has been released (so a
/// listener may safely call back into the cache).
///
/// If a listener returns an error, the remaining listeners for that event
/// are not invoked and the error is surfaced to the caller of the cache
/// operation as `CacheError::ListenerFailure`; the mutation itself stays
/// committed.
///
/// All callbacks default to doing nothing, so implementors only provide
/// the ones they care about.
pub trait CacheListener<K, V>: Send + Sync {
    /// A value was stored. Fires after any evictions the store caused.
    fn on_put(&self, cache: &BoundedCache<K, V>, key: &K, value: &V) -> ListenerResult {
        let _ = (cache, key, value);
        Ok(())
    }

    /// A read completed. `value` is `None` when the key was absent.
    ///
    /// Not fired when the read discovered an expired entry; that path
    /// fires `on_expire` instead.
    fn on_get(&self, cache: &BoundedCache<K, V>, key: &K, value: Option<&V>) -> ListenerResult {
        let _ = (cache, key, value);
        Ok(())
    }

    /// A live entry was explicitly removed.
    fn on_remove(&self, cache: &BoundedCache<K, V>, key: &K, value: &V) -> ListenerResult {
        let _ = (cache, key, value);
        Ok(())
    }

    /// An entry left the cache by capacity eviction or TTL expiry.
    fn on_expire(&self, cache: &BoundedCache<K, V>, key: &K, value: &V) -> ListenerResult {
        let _ = (cache, key, value);
        Ok(())
    }

    /// The cache was cleared. No per-entry events accompany this.
    fn on_clear(&self, cache: &BoundedCache<K, V>) -> ListenerResult {
        let _ = cache;
        Ok(())
    }
}

// == Cache Selector ==
/// Predicate-driven visitor over the live entries of a cache.
///
/// `select` snapshots the live entries, calls [`matches`](Self::matches)
/// for each, and invokes [`on_select`](Self::on_select) for those that
/// match. Selection never mutates the cache and fires no listener events.
pub trait CacheSelector<K, V> {
    /// Whether the entry should be visited.
    fn matches(&self, key: &K, value: &V) -> bool;

    /// Visit a matching entry.
    fn on_select(&self, cache: &BoundedCache<K, V>, key: &K, value: &V) -> ListenerResult;
}
