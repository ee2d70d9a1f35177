//! Replicated Cache
//!
//! Decorates a local bounded cache with group replication: mutations apply
//! locally first, then propagate to peers in the same group over a
//! broadcast transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheKey, CacheStats, RemoveOutcome};
use crate::error::{CacheError, Result};
use crate::replication::{CacheUpdate, Envelope, GroupTransport, TransportError};

/// Process-wide replica id source; ids only need to be unique per process
/// lifetime so a replica can recognize its own looped-back broadcasts.
static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

// == Replicated Cache ==
/// A bounded cache whose mutations propagate to group peers.
///
/// Every mutating operation applies to the local cache first, with full
/// local semantics (capacity, TTL, listeners). Only when local state
/// actually changed is the operation handed to an outbound channel, from
/// which a background pump serializes and broadcasts it; the caller never
/// waits on the transport, and no cache lock is held across a broadcast.
///
/// Incoming peer updates are applied with per-key equality suppression: a
/// put whose value already equals the live local value is discarded
/// without mutating anything or firing listeners, which also makes
/// duplicate delivery (at-least-once transports) harmless.
///
/// Caches bound to different group ids never interact, even when they
/// share one transport.
pub struct ReplicatedCache<K, V> {
    /// The local cache holding all state
    local: Arc<BoundedCache<K, V>>,
    /// Isolation scope for replication
    group_id: String,
    /// This replica's id, used to skip self-delivered broadcasts
    origin: u64,
    /// Outbound updates awaiting broadcast
    outbound: mpsc::UnboundedSender<CacheUpdate<K, V>>,
    /// Broadcast pump task
    pump: JoinHandle<()>,
    /// Peer delivery task
    delivery: JoinHandle<()>,
}

impl<K, V> ReplicatedCache<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    // == Constructor ==
    /// Joins a replication group on the given transport.
    ///
    /// Spawns the broadcast pump and the peer delivery loop; both are
    /// aborted when the replicated cache is dropped.
    pub async fn connect(
        local: Arc<BoundedCache<K, V>>,
        group_id: impl Into<String>,
        transport: Arc<dyn GroupTransport>,
    ) -> std::result::Result<Self, TransportError> {
        let group_id = group_id.into();
        let origin = NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed);
        let inbound = transport.connect(&group_id).await?;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(broadcast_pump(
            outbound_rx,
            Arc::clone(&transport),
            group_id.clone(),
            origin,
        ));
        let delivery = tokio::spawn(delivery_loop(
            inbound,
            Arc::clone(&local),
            group_id.clone(),
            origin,
        ));

        Ok(Self {
            local,
            group_id,
            origin,
            outbound,
            pump,
            delivery,
        })
    }

    // == Put ==
    /// Stores a key-value pair locally, then replicates it.
    ///
    /// A local no-op (capacity 0) broadcasts nothing. A listener failure
    /// does not prevent replication: the mutation committed before the
    /// listener ran, so peers still receive it and the error is surfaced
    /// afterwards.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let (stored, listener_err) = match self.local.put_inner(key.clone(), value.clone()) {
            Ok(stored) => (stored, None),
            // A listener failure means the entry itself was stored
            Err(err @ CacheError::ListenerFailure(_)) => (true, Some(err)),
            Err(err) => return Err(err),
        };
        if stored {
            self.send(CacheUpdate::Put { key, value });
        }
        listener_err.map_or(Ok(()), Err)
    }

    // == Put Many ==
    /// Stores a batch locally, then replicates the pairs actually stored.
    ///
    /// Validation is all-or-nothing like the local batch put. Pairs
    /// discarded locally (capacity 0) are not replicated.
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

        let mut applied = Vec::with_capacity(entries.len());
        let mut listener_err = None;
        for (key, value) in entries {
            match self.local.put_inner(key.clone(), value.clone()) {
                Ok(true) => applied.push((key, value)),
                Ok(false) => {}
                Err(err @ CacheError::ListenerFailure(_)) => {
                    // The failing pair was stored; the batch stops here
                    applied.push((key, value));
                    listener_err = Some(err);
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        if !applied.is_empty() {
            self.send(CacheUpdate::PutMany { entries: applied });
        }
        listener_err.map_or(Ok(()), Err)
    }

    // == Remove ==
    /// Removes a key locally, then replicates the removal.
    ///
    /// An absent key is a local no-op and broadcasts nothing. Dropping an
    /// expired entry did change local state, so it replicates.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        match self.local.remove_inner(key) {
            Ok(RemoveOutcome::Removed(value)) => {
                self.send(CacheUpdate::Remove { key: key.clone() });
                Ok(Some(value))
            }
            Ok(RemoveOutcome::Expired) => {
                self.send(CacheUpdate::Remove { key: key.clone() });
                Ok(None)
            }
            Ok(RemoveOutcome::Absent) => Ok(None),
            Err(err @ CacheError::ListenerFailure(_)) => {
                // Listeners only run when an entry actually left the map
                self.send(CacheUpdate::Remove { key: key.clone() });
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    // == Clear ==
    /// Clears the local cache, then replicates the clear.
    pub fn clear(&self) -> Result<()> {
        let result = self.local.clear();
        match result {
            Ok(()) => {
                self.send(CacheUpdate::Clear);
                Ok(())
            }
            Err(err @ CacheError::ListenerFailure(_)) => {
                self.send(CacheUpdate::Clear);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    // == Local Reads ==
    /// Reads from the local cache; reads are never replicated.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.local.get(key)
    }

    /// Current number of local entries.
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Returns true if the local cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Local counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.local.stats()
    }

    /// The replication group this cache is bound to.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The local cache backing this replica.
    pub fn local(&self) -> &Arc<BoundedCache<K, V>> {
        &self.local
    }

    // == Shutdown ==
    /// Stops the broadcast pump and the delivery loop.
    ///
    /// Updates still queued for broadcast are dropped; replication is
    /// best-effort by contract.
    pub fn shutdown(&self) {
        self.pump.abort();
        self.delivery.abort();
    }

    /// Hands an update to the broadcast pump.
    fn send(&self, update: CacheUpdate<K, V>) {
        if self.outbound.send(update).is_err() {
            warn!(group = %self.group_id, "broadcast pump is gone; dropping outbound update");
        }
    }
}

impl<K, V> Drop for ReplicatedCache<K, V> {
    fn drop(&mut self) {
        self.pump.abort();
        self.delivery.abort();
    }
}

impl<K, V> std::fmt::Debug for ReplicatedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedCache")
            .field("group_id", &self.group_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Drains the outbound queue, serializing and broadcasting each update.
///
/// Transport failures are logged and dropped; they never reach the caller
/// of the originating cache operation.
async fn broadcast_pump<K, V>(
    mut outbound: mpsc::UnboundedReceiver<CacheUpdate<K, V>>,
    transport: Arc<dyn GroupTransport>,
    group_id: String,
    origin: u64,
) where
    K: Serialize + Send,
    V: Serialize + Send,
{
    while let Some(update) = outbound.recv().await {
        let envelope = match Envelope::encode(&group_id, origin, &update) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(group = %group_id, error = %err, "failed to encode replication update");
                continue;
            }
        };
        if let Err(err) = transport.broadcast(envelope).await {
            warn!(group = %group_id, error = %err, "best-effort broadcast failed");
        }
    }
    debug!(group = %group_id, "broadcast pump stopped");
}

/// Applies peer updates to the local cache.
///
/// Envelopes for other groups and this replica's own looped-back
/// broadcasts are skipped; decode and apply failures are logged, never
/// raised.
async fn delivery_loop<K, V>(
    mut inbound: mpsc::UnboundedReceiver<Envelope>,
    local: Arc<BoundedCache<K, V>>,
    group_id: String,
    origin: u64,
) where
    K: CacheKey + DeserializeOwned + Send + Sync,
    V: Clone + PartialEq + DeserializeOwned + Send + Sync,
{
    while let Some(envelope) = inbound.recv().await {
        if envelope.group_id != group_id {
            warn!(
                group = %group_id,
                received = %envelope.group_id,
                "dropping envelope addressed to another group"
            );
            continue;
        }
        if envelope.origin == origin {
            continue;
        }
        let update = match envelope.decode::<K, V>() {
            Ok(update) => update,
            Err(err) => {
                warn!(group = %group_id, error = %err, "failed to decode replication update");
                continue;
            }
        };
        if let Err(err) = apply_remote(&local, update) {
            warn!(group = %group_id, error = %err, "failed to apply remote update");
        }
    }
    debug!(group = %group_id, "delivery loop stopped");
}

/// Applies one remote update with per-key equality suppression.
fn apply_remote<K, V>(local: &BoundedCache<K, V>, update: CacheUpdate<K, V>) -> Result<()>
where
    K: CacheKey,
    V: Clone + PartialEq,
{
    match update {
        CacheUpdate::Put { key, value } => local.put_if_changed(key, value).map(|_| ()),
        CacheUpdate::PutMany { entries } => entries
            .into_iter()
            .try_for_each(|(key, value)| local.put_if_changed(key, value).map(|_| ())),
        CacheUpdate::Remove { key } => local.remove_inner(&key).map(|_| ()),
        CacheUpdate::Clear => local.clear(),
    }
}
