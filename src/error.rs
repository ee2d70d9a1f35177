//! Error types for the cache engine and its HTTP surface
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and server.
///
/// Absence of a key is not an error: `get` and `remove` report it as
/// `Ok(None)`. The `NotFound` variant exists for the HTTP layer, which maps
/// an absent key to a 404 response.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key carries no identity (blank) and cannot be stored or removed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key not found (HTTP surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A registered listener failed during notification.
    ///
    /// The mutation that triggered the notification has already committed;
    /// remaining listeners for that event were not invoked.
    #[error("Listener failed: {0}")]
    ListenerFailure(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::ListenerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
