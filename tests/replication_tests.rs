//! Integration Tests for Cache Replication
//!
//! Drives two or more replicated caches over the in-memory group transport
//! and verifies propagation, suppression, and isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peercache::cache::{BoundedCache, CacheListener, ListenerResult};
use peercache::replication::{CacheUpdate, Envelope, GroupTransport, InMemoryTransport};
use peercache::ReplicatedCache;

// == Helper Functions ==

fn local_cache(name: &str, capacity: usize) -> Arc<BoundedCache<String, String>> {
    Arc::new(BoundedCache::new(name, capacity, Duration::ZERO))
}

async fn replica(
    transport: &Arc<InMemoryTransport>,
    group: &str,
    capacity: usize,
) -> ReplicatedCache<String, String> {
    let local = local_cache(group, capacity);
    ReplicatedCache::connect(local, group, transport.clone())
        .await
        .unwrap()
}

/// Polls until the condition holds, or panics after ~1 second.
async fn wait_for<F>(what: &str, cond: F)
where
    F: Fn() -> bool,
{
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Counts `on_put` notifications.
#[derive(Default)]
struct PutCounter {
    puts: AtomicUsize,
}

impl PutCounter {
    fn count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl CacheListener<String, String> for PutCounter {
    fn on_put(
        &self,
        _cache: &BoundedCache<String, String>,
        _key: &String,
        _value: &String,
    ) -> ListenerResult {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// == Propagation Tests ==

#[tokio::test]
async fn test_put_propagates_to_peer() {
    let transport = Arc::new(InMemoryTransport::new());
    let r1 = replica(&transport, "group-a", 10).await;
    let r2 = replica(&transport, "group-a", 10).await;

    r1.put("key1".to_string(), "value1".to_string()).unwrap();

    wait_for("peer to receive the put", || {
        r2.local().values().contains(&"value1".to_string())
    })
    .await;
    assert_eq!(
        r2.get(&"key1".to_string()).unwrap(),
        Some("value1".to_string())
    );
}

#[tokio::test]
async fn test_put_many_propagates_to_peer() {
    let transport = Arc::new(InMemoryTransport::new());
    let r1 = replica(&transport, "group-a", 10).await;
    let r2 = replica(&transport, "group-a", 10).await;

    r1.put_many(vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
        ("c".to_string(), "3".to_string()),
    ])
    .unwrap();

    wait_for("peer to receive the batch", || r2.len() == 3).await;
    assert_eq!(r2.get(&"b".to_string()).unwrap(), Some("2".to_string()));
}

#[tokio::test]
async fn test_remove_propagates_to_peer() {
    let transport = Arc::new(InMemoryTransport::new());
    let r1 = replica(&transport, "group-a", 10).await;
    let r2 = replica(&transport, "group-a", 10).await;

    r1.put("key1".to_string(), "value1".to_string()).unwrap();
    wait_for("peer to receive the put", || r2.len() == 1).await;

    r1.remove(&"key1".to_string()).unwrap();
    wait_for("peer to apply the remove", || r2.is_empty()).await;
}

#[tokio::test]
async fn test_clear_propagates_to_peer() {
    let transport = Arc::new(InMemoryTransport::new());
    let r1 = replica(&transport, "group-a", 10).await;
    let r2 = replica(&transport, "group-a", 10).await;

    r1.put("a".to_string(), "1".to_string()).unwrap();
    r1.put("b".to_string(), "2".to_string()).unwrap();
    wait_for("peer to receive both puts", || r2.len() == 2).await;

    r1.clear().unwrap();
    wait_for("peer to apply the clear", || r2.is_empty()).await;
}

#[tokio::test]
async fn test_local_mutation_is_visible_before_propagation() {
    let transport = Arc::new(InMemoryTransport::new());
    let r1 = replica(&transport, "group-a", 10).await;

    r1.put("key1".to_string(), "value1".to_string()).unwrap();

    // No settling: the local commit happens before put returns
    assert_eq!(
        r1.get(&"key1".to_string()).unwrap(),
        Some("value1".to_string())
    );
}

// == Suppression Tests ==

#[tokio::test]
async fn test_duplicate_delivery_fires_no_second_put() {
    let transport = Arc::new(InMemoryTransport::new());
    let r2 = replica(&transport, "group-a", 10).await;
    let counter = Arc::new(PutCounter::default());
    r2.local().add_listener(counter.clone());

    // Hand-deliver the same PUT twice, as an at-least-once transport may
    let update = CacheUpdate::Put {
        key: "key1".to_string(),
        value: "v".to_string(),
    };
    let envelope = Envelope::encode("group-a", 9999, &update).unwrap();

    transport.broadcast(envelope.clone()).await.unwrap();
    wait_for("first delivery to apply", || counter.count() == 1).await;

    transport.broadcast(envelope).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The equal value was suppressed: no mutation, no second event
    assert_eq!(counter.count(), 1);
    assert_eq!(r2.get(&"key1".to_string()).unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn test_changed_value_is_applied_after_suppression() {
    let transport = Arc::new(InMemoryTransport::new());
    let r2 = replica(&transport, "group-a", 10).await;
    let counter = Arc::new(PutCounter::default());
    r2.local().add_listener(counter.clone());

    let first = CacheUpdate::Put {
        key: "key1".to_string(),
        value: "v1".to_string(),
    };
    let second = CacheUpdate::Put {
        key: "key1".to_string(),
        value: "v2".to_string(),
    };

    transport
        .broadcast(Envelope::encode("group-a", 9999, &first).unwrap())
        .await
        .unwrap();
    wait_for("first value to apply", || counter.count() == 1).await;

    transport
        .broadcast(Envelope::encode("group-a", 9999, &second).unwrap())
        .await
        .unwrap();
    wait_for("changed value to apply", || counter.count() == 2).await;

    assert_eq!(r2.get(&"key1".to_string()).unwrap(), Some("v2".to_string()));
}

#[tokio::test]
async fn test_per_key_suppression_in_batches() {
    let transport = Arc::new(InMemoryTransport::new());
    let r2 = replica(&transport, "group-a", 10).await;

    // Seed one of the batch keys with the same value it will arrive with
    r2.local().put("a".to_string(), "1".to_string()).unwrap();
    let counter = Arc::new(PutCounter::default());
    r2.local().add_listener(counter.clone());

    let update = CacheUpdate::PutMany {
        entries: vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ],
    };
    transport
        .broadcast(Envelope::encode("group-a", 9999, &update).unwrap())
        .await
        .unwrap();

    wait_for("fresh batch key to apply", || r2.len() == 2).await;

    // Only the key that actually changed fired a put
    assert_eq!(counter.count(), 1);
}

// == Isolation Tests ==

#[tokio::test]
async fn test_groups_are_isolated() {
    let transport = Arc::new(InMemoryTransport::new());
    let r_a1 = replica(&transport, "group-a", 10).await;
    let r_a2 = replica(&transport, "group-a", 10).await;
    let r_b = replica(&transport, "group-b", 10).await;

    r_a1.put("key1".to_string(), "value1".to_string()).unwrap();

    // Delivery within group A proves the broadcast went out
    wait_for("group-a peer to receive the put", || r_a2.len() == 1).await;

    assert!(r_b.is_empty());
    assert_eq!(r_b.get(&"key1".to_string()).unwrap(), None);
}

#[tokio::test]
async fn test_replicas_report_their_group() {
    let transport = Arc::new(InMemoryTransport::new());
    let r = replica(&transport, "group-a", 10).await;

    assert_eq!(r.group_id(), "group-a");
}

// == No-op Tests ==

#[tokio::test]
async fn test_capacity_zero_replica_stays_silent() {
    let transport = Arc::new(InMemoryTransport::new());
    let muted = replica(&transport, "group-a", 0).await;
    let peer = replica(&transport, "group-a", 10).await;

    muted.put("key1".to_string(), "value1".to_string()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The local application was a no-op, so nothing was broadcast
    assert!(muted.is_empty());
    assert!(peer.is_empty());
}
