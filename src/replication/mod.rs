//! Replication Module
//!
//! Group replication for the bounded cache: serialized mutation messages,
//! the broadcast transport seam, and the replicated cache decorator.

mod message;
mod replicated;
mod transport;

// Re-export public types
pub use message::{CacheUpdate, Envelope};
pub use replicated::ReplicatedCache;
pub use transport::{GroupTransport, InMemoryTransport, TransportError};
