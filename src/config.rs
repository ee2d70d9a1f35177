//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold (0 caches nothing)
    pub capacity: usize,
    /// Time-to-live in seconds for every entry (0 means entries never expire)
    pub time_to_live_secs: u64,
    /// Cache name, also used as the replication group id
    pub cache_name: String,
    /// HTTP server port
    pub server_port: u16,
    /// Background reaper interval in seconds (0 disables the reaper)
    pub reaper_interval_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `TIME_TO_LIVE` - Entry TTL in seconds, 0 = never expire (default: 0)
    /// - `CACHE_NAME` - Cache / replication group name (default: "default")
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REAPER_INTERVAL` - Expiry sweep frequency in seconds, 0 = off (default: 1)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            time_to_live_secs: env::var("TIME_TO_LIVE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            cache_name: env::var("CACHE_NAME").unwrap_or_else(|_| "default".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            reaper_interval_secs: env::var("REAPER_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            time_to_live_secs: 0,
            cache_name: "default".to_string(),
            server_port: 3000,
            reaper_interval_secs: 1,
        }
    }
}
