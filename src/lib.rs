//! Peercache - A concurrent bounded cache with group replication
//!
//! Provides a capacity-bounded keyed cache with FIFO eviction
//! (refresh-on-update), TTL expiration, listener notification, and an
//! optional cluster-replicated variant over a broadcast transport.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod replication;
pub mod tasks;

pub use api::AppState;
pub use cache::{BoundedCache, CacheKey, CacheListener, CacheSelector};
pub use config::Config;
pub use error::{CacheError, Result};
pub use replication::{GroupTransport, InMemoryTransport, ReplicatedCache};
pub use tasks::spawn_reaper_task;
