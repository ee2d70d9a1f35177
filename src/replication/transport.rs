//! Group Transport
//!
//! The broadcast transport seam used for cache replication, plus an
//! in-process implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use super::message::Envelope;

// == Transport Error ==
/// Failure connecting to or broadcasting within a group.
///
/// Replication is best-effort: broadcast failures are logged by the
/// replication layer and never surfaced through cache operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport refused or lost the group connection
    #[error("Transport connection failed: {0}")]
    Connect(String),

    /// A broadcast could not be handed to the transport
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
}

// == Group Transport ==
/// Broadcast transport connecting the members of named groups.
///
/// A member joins a group with [`connect`](Self::connect) and receives
/// every envelope broadcast to that group, its own included, on the
/// returned channel. `broadcast` is fire-and-forget: delivery is
/// best-effort with whatever guarantee the underlying transport provides
/// (at-least-once is assumed by the replication layer).
#[async_trait]
pub trait GroupTransport: Send + Sync {
    /// Joins a group, returning the delivery channel for its envelopes.
    async fn connect(
        &self,
        group_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<Envelope>, TransportError>;

    /// Broadcasts an envelope to every member of its group.
    async fn broadcast(&self, envelope: Envelope) -> Result<(), TransportError>;
}

// == In-Memory Transport ==
/// Process-local group transport.
///
/// Delivers each broadcast to every current member of the envelope's
/// group, sender included. Members whose receiving end has gone away are
/// pruned on the next broadcast.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    /// Delivery channels per group
    groups: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>>,
}

impl InMemoryTransport {
    /// Creates a transport with no groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live members in a group.
    pub fn member_count(&self, group_id: &str) -> usize {
        self.groups
            .lock()
            .get(group_id)
            .map(|members| members.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl GroupTransport for InMemoryTransport {
    async fn connect(
        &self,
        group_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<Envelope>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.groups
            .lock()
            .entry(group_id.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn broadcast(&self, envelope: Envelope) -> Result<(), TransportError> {
        let mut groups = self.groups.lock();
        if let Some(members) = groups.get_mut(&envelope.group_id) {
            members.retain(|tx| tx.send(envelope.clone()).is_ok());
        }
        Ok(())
    }
}
