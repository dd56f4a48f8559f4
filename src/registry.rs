//! Sharded registry of live connections.
//!
//! `ConnectionRegistry` owns an `Arc` to every registered [`Connection`] and
//! is the single source for the active connection count used by admission
//! control. Connections hold only a weak back-reference and remove themselves
//! when they close.
//!
//! No shard lock is held while a connection is closed: closing deregisters,
//! which would otherwise re-enter the same shard.

use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::{
    connection::{Connection, ConnectionId},
    metrics,
};

/// Concurrent map of connections keyed by [`ConnectionId`].
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    shards: usize,
}

impl ConnectionRegistry {
    /// Create a registry split into `shards` shards, rounded up to a power of
    /// two of at least 2.
    #[must_use]
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(2).next_power_of_two();
        Self {
            connections: DashMap::with_shard_amount(shards),
            shards,
        }
    }

    /// Number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize { self.shards }

    /// Register `connection`. Returns `false` if its id is already present.
    pub fn add(&self, connection: Arc<Connection>) -> bool {
        let id = connection.id();
        let inserted = match self.connections.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(connection);
                true
            }
        };
        if inserted {
            metrics::inc_connections();
        }
        inserted
    }

    /// Remove and return the connection registered under `id`.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(&id).map(|(_, conn)| conn);
        if removed.is_some() {
            metrics::dec_connections();
        }
        removed
    }

    /// Connection registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize { self.connections.len() }

    /// Returns `true` if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.connections.is_empty() }

    /// Identifiers of all registered connections, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Remove and close every registered connection, returning how many were
    /// closed.
    pub fn clear(&self) -> usize {
        let mut closed = 0;
        for id in self.ids() {
            if let Some(connection) = self.remove(id) {
                connection.close_with(false);
                closed += 1;
            }
        }
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self { Self::new(16) }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .field("shards", &self.shards)
            .finish()
    }
}
