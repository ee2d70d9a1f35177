//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::collections::HashMap;

use serde::Deserialize;

// == Request Limits ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

fn validate_pair(key: &str, value: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    if value.len() > MAX_VALUE_SIZE {
        return Some(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        ));
    }
    None
}

/// Request body for the SET operation (PUT /set)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
}

impl SetRequest {
    /// Validates the request data.
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_pair(&self.key, &self.value)
    }
}

/// Request body for the batch SET operation (PUT /set-many)
///
/// Validation is all-or-nothing: one bad pair rejects the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SetManyRequest {
    /// The key-value pairs to store
    pub entries: HashMap<String, String>,
}

impl SetManyRequest {
    /// Validates every pair in the batch.
    pub fn validate(&self) -> Option<String> {
        if self.entries.is_empty() {
            return Some("Batch cannot be empty".to_string());
        }
        self.entries
            .iter()
            .find_map(|(key, value)| validate_pair(key, value))
    }
}
