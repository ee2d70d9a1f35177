//! Cache Store Module
//!
//! The concurrent bounded cache: HashMap storage plus FIFO eviction order,
//! TTL expiration, and listener notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::cache::{CacheKey, CacheListener, CacheSelector, CacheStats, Entry, EvictionOrder};
use crate::error::{CacheError, Result};

// == Events ==
/// One listener-visible outcome of a cache operation.
///
/// Events are queued while the store lock is held and dispatched after it
/// is released, so listener latency never extends the critical section and
/// listeners may re-enter the cache.
enum Event<K, V> {
    Put { key: K, value: V },
    Get { key: K, value: Option<V> },
    Remove { key: K, value: V },
    Expire { key: K, value: V },
    Clear,
}

/// Outcome of an internal remove, distinguishing the expired path.
pub(crate) enum RemoveOutcome<V> {
    /// A live entry was removed; carries its value
    Removed(V),
    /// An expired entry was dropped on the way
    Expired,
    /// Nothing was stored under the key
    Absent,
}

// == Inner State ==
/// Shared mutable state, guarded as one unit so the map and the eviction
/// order can never disagree at an observable point.
struct Inner<K, V> {
    /// Key-value storage
    entries: HashMap<K, Entry<K, V>>,
    /// FIFO insertion-order tracker
    order: EvictionOrder<K>,
    /// Performance counters
    stats: CacheStats,
    /// Maximum number of entries retained (0 retains nothing)
    capacity: usize,
    /// Age bound for entries (zero = never expire)
    time_to_live: Duration,
}

// == Bounded Cache ==
/// A concurrent, capacity-bounded cache with FIFO eviction.
///
/// Overwriting a key refreshes its position in the eviction order, so an
/// updated entry becomes the most recently inserted rather than the next
/// eviction candidate. Entries older than the cache-wide TTL are discovered
/// and dropped lazily on the next read or remove touching them; no
/// background thread is required for correctness.
///
/// All operations are safe to call from any number of threads. Capacity and
/// TTL can be changed at runtime; a capacity shrink takes effect on the
/// next mutating call.
pub struct BoundedCache<K, V> {
    /// Cache name, exposed for management
    name: String,
    /// Map, order, and counters under a single lock
    inner: Mutex<Inner<K, V>>,
    /// Registered listeners, notified in registration order
    listeners: RwLock<Vec<Arc<dyn CacheListener<K, V>>>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: CacheKey,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new cache.
    ///
    /// # Arguments
    /// * `name` - Cache name, exposed through the stats surface
    /// * `capacity` - Maximum number of entries (0 means nothing is retained)
    /// * `time_to_live` - Age bound for entries (zero means entries never expire)
    pub fn new(name: impl Into<String>, capacity: usize, time_to_live: Duration) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: EvictionOrder::new(),
                stats: CacheStats::new(),
                capacity,
                time_to_live,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    // == Listener Registration ==
    /// Registers a listener. Listeners are notified in registration order.
    pub fn add_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        self.listeners.write().push(listener);
    }

    // == Put ==
    /// Stores a key-value pair.
    ///
    /// A blank key fails with `InvalidKey` and changes nothing. With a
    /// capacity of 0 the value is silently discarded and no listener fires.
    /// Otherwise the entry is stored at the back of the eviction order
    /// (replacing and refreshing any previous entry for the key), surplus
    /// entries are evicted oldest-first with one `on_expire` each, and a
    /// final `on_put` fires for the stored entry.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.put_inner(key, value).map(|_| ())
    }

    /// `put` that additionally reports whether the value was stored.
    ///
    /// Returns `Ok(false)` only on the capacity-0 discard path.
    pub(crate) fn put_inner(&self, key: K, value: V) -> Result<bool> {
        if key.is_blank() {
            return Err(CacheError::InvalidKey(
                "cannot store a value under a blank key".to_string(),
            ));
        }

        let mut events = Vec::new();
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            // Nothing is ever retained at capacity 0
            if inner.capacity == 0 {
                return Ok(false);
            }

            let handle = if inner.entries.contains_key(&key) {
                inner.order.refresh(key.clone())
            } else {
                inner.order.append(key.clone())
            };
            inner
                .entries
                .insert(key.clone(), Entry::new(key.clone(), value.clone(), handle.stamp()));

            // Trim back to the bound; evictions report oldest-first, ahead
            // of the put event for the entry just stored
            while inner.entries.len() > inner.capacity {
                for evicted in inner.order.trim_to(inner.capacity) {
                    if let Some(old) = inner.entries.remove(&evicted) {
                        inner.stats.record_eviction();
                        events.push(Event::Expire {
                            key: old.key,
                            value: old.value,
                        });
                    }
                }
            }

            let len = inner.entries.len();
            inner.stats.set_total_entries(len);
            events.push(Event::Put { key, value });
        }

        self.notify(&events)?;
        Ok(true)
    }

    // == Put Many ==
    /// Stores a batch of key-value pairs.
    ///
    /// Validation is all-or-nothing: if any key in the batch is blank the
    /// whole call fails with `InvalidKey` and no entry is applied. On
    /// success each pair is applied as an individual `put`, in iteration
    /// order, with per-pair eviction and listener semantics. A listener
    /// failure stops the batch at the failing pair; pairs already applied
    /// stay committed.
    pub fn put_many<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        if entries.iter().any(|(key, _)| key.is_blank()) {
            return Err(CacheError::InvalidKey(
                "batch contains a blank key; no entries were applied".to_string(),
            ));
        }
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    // == Put If Changed ==
    /// Stores the value unless an equal one is already live under the key.
    ///
    /// Equality is by value, not identity. When the stored value is live,
    /// unexpired, and equal, the call is a no-op that preserves the
    /// existing entry (and fires nothing), returning `false`. Otherwise it
    /// behaves exactly like [`put`](Self::put) and returns whether the
    /// value was stored. Applying the same put twice is therefore
    /// idempotent: the second application changes nothing.
    pub fn put_if_changed(&self, key: K, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        if key.is_blank() {
            return Err(CacheError::InvalidKey(
                "cannot store a value under a blank key".to_string(),
            ));
        }
        {
            let guard = self.inner.lock();
            let now = Instant::now();
            if let Some(existing) = guard.entries.get(&key) {
                if !existing.is_expired(guard.time_to_live, now) && existing.value == value {
                    return Ok(false);
                }
            }
        }
        self.put_inner(key, value)
    }

    // == Get ==
    /// Retrieves the value stored under a key.
    ///
    /// A blank key is a silent miss: `Ok(None)` with no counter or event.
    /// An absent key counts a miss and fires `on_get(key, None)`. An
    /// expired entry is removed, counts a miss, and fires exactly one
    /// `on_expire` (no `on_get`). A live entry counts a hit and fires
    /// `on_get` with the value.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        if key.is_blank() {
            return Ok(None);
        }

        enum Lookup<V> {
            Absent,
            Expired,
            Live(V),
        }

        let mut events = Vec::new();
        let found = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let now = Instant::now();

            let lookup = match inner.entries.get(key) {
                None => Lookup::Absent,
                Some(entry) if entry.is_expired(inner.time_to_live, now) => Lookup::Expired,
                Some(entry) => Lookup::Live(entry.value.clone()),
            };

            match lookup {
                Lookup::Absent => {
                    inner.stats.record_miss();
                    events.push(Event::Get {
                        key: key.clone(),
                        value: None,
                    });
                    None
                }
                Lookup::Expired => {
                    let removed = inner.entries.remove(key);
                    inner.order.remove(key);
                    inner.stats.record_miss();
                    inner.stats.record_expiration();
                    let len = inner.entries.len();
                    inner.stats.set_total_entries(len);
                    if let Some(old) = removed {
                        events.push(Event::Expire {
                            key: old.key,
                            value: old.value,
                        });
                    }
                    None
                }
                Lookup::Live(value) => {
                    inner.stats.record_hit();
                    events.push(Event::Get {
                        key: key.clone(),
                        value: Some(value.clone()),
                    });
                    Some(value)
                }
            }
        };

        self.notify(&events)?;
        Ok(found)
    }

    // == Remove ==
    /// Removes the entry stored under a key.
    ///
    /// A blank key fails with `InvalidKey`. An absent key returns
    /// `Ok(None)` with no event. An expired entry is dropped with one
    /// `on_expire` and reported as absent. A live entry is removed with
    /// one `on_remove` and its value is returned.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        match self.remove_inner(key)? {
            RemoveOutcome::Removed(value) => Ok(Some(value)),
            RemoveOutcome::Expired | RemoveOutcome::Absent => Ok(None),
        }
    }

    /// `remove` that additionally distinguishes the expired path.
    pub(crate) fn remove_inner(&self, key: &K) -> Result<RemoveOutcome<V>> {
        if key.is_blank() {
            return Err(CacheError::InvalidKey(
                "cannot remove a blank key".to_string(),
            ));
        }

        let mut events = Vec::new();
        let outcome = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let now = Instant::now();

            match inner.entries.remove(key) {
                None => RemoveOutcome::Absent,
                Some(entry) => {
                    inner.order.remove(key);
                    let len = inner.entries.len();
                    inner.stats.set_total_entries(len);
                    if entry.is_expired(inner.time_to_live, now) {
                        inner.stats.record_expiration();
                        events.push(Event::Expire {
                            key: entry.key,
                            value: entry.value,
                        });
                        RemoveOutcome::Expired
                    } else {
                        events.push(Event::Remove {
                            key: entry.key,
                            value: entry.value.clone(),
                        });
                        RemoveOutcome::Removed(entry.value)
                    }
                }
            }
        };

        self.notify(&events)?;
        Ok(outcome)
    }

    // == Clear ==
    /// Empties the cache atomically.
    ///
    /// Fires exactly one `on_clear` event; entries leave without per-entry
    /// events.
    pub fn clear(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.entries.clear();
            inner.order.clear();
            inner.stats.set_total_entries(0);
        }
        self.notify(&[Event::Clear])
    }

    // == Purge Expired ==
    /// Removes every expired entry, firing `on_expire` for each.
    ///
    /// Returns the number of entries removed. Lazy per-access expiry is the
    /// correctness mechanism; this walk exists for the optional background
    /// reaper and for callers that want eager reclamation.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut events = Vec::new();
        let removed = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let now = Instant::now();
            let ttl = inner.time_to_live;
            if ttl.is_zero() {
                return Ok(0);
            }

            let expired: Vec<K> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(ttl, now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                if let Some(old) = inner.entries.remove(key) {
                    inner.order.remove(key);
                    inner.stats.record_expiration();
                    events.push(Event::Expire {
                        key: old.key,
                        value: old.value,
                    });
                }
            }
            let len = inner.entries.len();
            inner.stats.set_total_entries(len);
            expired.len()
        };

        self.notify(&events)?;
        Ok(removed)
    }

    // == Select ==
    /// Visits a snapshot of the live entries.
    ///
    /// For each entry where `selector.matches` is true, `on_select` is
    /// invoked with this cache as context. Selection never mutates the
    /// cache and fires no put/get/remove events. The first `on_select`
    /// error stops the walk.
    pub fn select<S>(&self, selector: &S) -> Result<()>
    where
        S: CacheSelector<K, V> + ?Sized,
    {
        for (key, value) in self.live_snapshot() {
            if selector.matches(&key, &value) {
                selector
                    .on_select(self, &key, &value)
                    .map_err(|e| CacheError::ListenerFailure(e.to_string()))?;
            }
        }
        Ok(())
    }

    // == Values ==
    /// Snapshot of all live values, consistent with one instant.
    pub fn values(&self) -> Vec<V> {
        self.live_snapshot().into_iter().map(|(_, v)| v).collect()
    }

    // == Observers ==
    /// Current number of entries, expired-but-uncollected ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured capacity bound.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Configured time-to-live (zero = entries never expire).
    pub fn time_to_live(&self) -> Duration {
        self.inner.lock().time_to_live
    }

    /// Number of reads that found a live entry.
    pub fn hit_count(&self) -> u64 {
        self.inner.lock().stats.hits
    }

    /// Number of reads that found nothing.
    pub fn miss_count(&self) -> u64 {
        self.inner.lock().stats.misses
    }

    /// Snapshot of the performance counters.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        let mut stats = guard.stats.clone();
        stats.set_total_entries(guard.entries.len());
        stats
    }

    // == Runtime Reconfiguration ==
    /// Changes the capacity bound.
    ///
    /// A shrink below the current size takes effect on the next mutating
    /// call, which trims down to the new bound.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.lock().capacity = capacity;
    }

    /// Changes the time-to-live applied to all entries.
    pub fn set_time_to_live(&self, time_to_live: Duration) {
        self.inner.lock().time_to_live = time_to_live;
    }

    /// Clones the live (non-expired) entries at one instant.
    fn live_snapshot(&self) -> Vec<(K, V)> {
        let guard = self.inner.lock();
        let now = Instant::now();
        guard
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(guard.time_to_live, now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Dispatches queued events to the registered listeners.
    ///
    /// Runs with no internal lock held. The listener list is snapshotted so
    /// a callback may register further listeners without deadlocking. The
    /// first listener error aborts the remaining notifications for this
    /// dispatch and surfaces as `ListenerFailure`.
    fn notify(&self, events: &[Event<K, V>]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return Ok(());
        }
        for event in events {
            for listener in &listeners {
                let outcome = match event {
                    Event::Put { key, value } => listener.on_put(self, key, value),
                    Event::Get { key, value } => listener.on_get(self, key, value.as_ref()),
                    Event::Remove { key, value } => listener.on_remove(self, key, value),
                    Event::Expire { key, value } => listener.on_expire(self, key, value),
                    Event::Clear => listener.on_clear(self),
                };
                outcome.map_err(|e| CacheError::ListenerFailure(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Whether the map and the eviction order agree on the key set.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let guard = self.inner.lock();
        guard.entries.len() == guard.order.len()
            && guard.entries.keys().all(|key| guard.order.contains(key))
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache").field("name", &self.name).finish_non_exhaustive()
    }
}
