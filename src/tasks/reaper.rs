//! TTL Reaper Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! Expiry is discovered lazily on reads and removes; the reaper only
//! reclaims memory for entries nothing touches anymore. Correctness never
//! depends on it running.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{BoundedCache, CacheKey};

/// Spawns a background task that periodically purges expired entries.
///
/// The task sleeps for the given interval between sweeps. Each sweep fires
/// `on_expire` for the entries it removes; a listener failure aborts that
/// sweep and is logged, never propagated.
///
/// # Arguments
/// * `cache` - Shared reference to the cache to sweep
/// * `reaper_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_reaper_task<K, V>(
    cache: Arc<BoundedCache<K, V>>,
    reaper_interval_secs: u64,
) -> JoinHandle<()>
where
    K: CacheKey + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let interval = Duration::from_secs(reaper_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting TTL reaper task with interval of {} seconds",
            reaper_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired() {
                Ok(removed) if removed > 0 => {
                    info!("TTL reaper: removed {} expired entries", removed);
                }
                Ok(_) => {
                    debug!("TTL reaper: no expired entries found");
                }
                Err(err) => {
                    warn!("TTL reaper: listener failed during sweep: {}", err);
                }
            }
        }
    })
}
