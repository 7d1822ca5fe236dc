//! Registry of live connections.
//!
//! The pool stores non-owning weak references so the deadline sweep can
//! visit every live connection without keeping drained connections alive.
//! Dead entries are pruned while collecting.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::connection::Connection;

/// Identifier assigned to a connection when it is attached to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concurrent map of weak connection references keyed by [`ConnectionId`].
#[derive(Default)]
pub(super) struct Registry(DashMap<ConnectionId, Weak<Connection>>);

impl Registry {
    pub(super) fn insert(&self, conn: &Arc<Connection>) {
        self.0.insert(conn.id(), Arc::downgrade(conn));
    }

    pub(super) fn remove(&self, id: ConnectionId) { self.0.remove(&id); }

    /// Collect the live connections, pruning entries whose owner dropped
    /// them.
    ///
    /// `DashMap::retain` takes per-bucket write locks, so other registry
    /// operations may contend briefly during a sweep.
    pub(super) fn live(&self) -> Vec<Arc<Connection>> {
        let mut live = Vec::with_capacity(self.0.len());
        self.0.retain(|_, weak| {
            if let Some(conn) = weak.upgrade() {
                live.push(conn);
                true
            } else {
                false
            }
        });
        live
    }
}
