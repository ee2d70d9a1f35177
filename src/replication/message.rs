//! Replication Messages
//!
//! Wire-level representation of cache mutations exchanged within a group.

use serde::{Deserialize, Serialize};

// == Cache Update ==
/// One replicated cache mutation.
///
/// The opcode tag plus the key/value payload is the entire protocol; peers
/// re-apply the operation against their own local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CacheUpdate<K, V> {
    /// Store one key-value pair
    Put { key: K, value: V },
    /// Store a batch of key-value pairs
    PutMany { entries: Vec<(K, V)> },
    /// Drop one key
    Remove { key: K },
    /// Drop everything
    Clear,
}

// == Envelope ==
/// A serialized update addressed to a replication group.
///
/// `origin` is a process-unique replica id. Group transports commonly loop
/// a broadcast back to its sender; receivers drop envelopes carrying their
/// own origin instead of re-applying them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Isolation scope: only caches bound to this group apply the payload
    pub group_id: String,
    /// Replica id of the sender
    pub origin: u64,
    /// Serialized [`CacheUpdate`]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Serializes an update into an envelope for the given group.
    pub fn encode<K, V>(
        group_id: &str,
        origin: u64,
        update: &CacheUpdate<K, V>,
    ) -> serde_json::Result<Self>
    where
        K: Serialize,
        V: Serialize,
    {
        Ok(Self {
            group_id: group_id.to_string(),
            origin,
            payload: serde_json::to_vec(update)?,
        })
    }

    /// Deserializes the carried update.
    pub fn decode<K, V>(&self) -> serde_json::Result<CacheUpdate<K, V>>
    where
        K: for<'de> Deserialize<'de>,
        V: for<'de> Deserialize<'de>,
    {
        serde_json::from_slice(&self.payload)
    }
}
