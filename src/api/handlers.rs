//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::BoundedCache;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetManyRequest, SetManyResponse,
    SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache is internally synchronized, so handlers call it directly
/// without any outer lock.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache engine
    pub cache: Arc<BoundedCache<String, String>>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: BoundedCache<String, String>) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let cache = BoundedCache::new(
            config.cache_name.clone(),
            config.capacity,
            std::time::Duration::from_secs(config.time_to_live_secs),
        );
        Self::new(cache)
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.put(req.key.clone(), req.value)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for PUT /set-many
///
/// Stores a batch of key-value pairs; one bad pair rejects the whole batch.
pub async fn set_many_handler(
    State(state): State<AppState>,
    Json(req): Json<SetManyRequest>,
) -> Result<Json<SetManyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let count = req.entries.len();
    state.cache.put_many(req.entries)?;

    Ok(Json(SetManyResponse::new(count)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. Absent or expired keys map to
/// a 404 response.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key)? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    match state.cache.remove(&key)? {
        Some(_) => Ok(Json(DeleteResponse::new(key))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /clear
///
/// Empties the cache.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear()?;
    Ok(Json(ClearResponse::new()))
}

/// Handler for GET /stats
///
/// Returns the management view of the cache: configuration, size, and
/// performance counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = &state.cache;
    let stats = cache.stats();

    Json(StatsResponse {
        name: cache.name().to_string(),
        size: stats.total_entries,
        capacity: cache.capacity(),
        time_to_live_secs: cache.time_to_live().as_secs(),
        hits: stats.hits,
        misses: stats.misses,
        evictions: stats.evictions,
        expirations: stats.expirations,
        hit_rate: stats.hit_rate(),
    })
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
