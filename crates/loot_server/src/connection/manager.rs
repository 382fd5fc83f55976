//! Registry of open observer connections.

use super::{ClientConnection, ConnectionId};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Tracks open connections and enforces `max_connections`.
#[derive(Debug)]
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, ClientConnection>,
    active: AtomicUsize,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            active: AtomicUsize::new(0),
            max_connections,
        }
    }

    /// Registers a new connection, or returns `None` when the limit has
    /// been reached.
    pub fn try_add(&self, remote_addr: SocketAddr) -> Option<ConnectionId> {
        let reserved = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_connections).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            return None;
        }

        let connection_id = ConnectionId::new();
        self.connections
            .insert(connection_id, ClientConnection::new(remote_addr));
        info!("🔗 Observer {} connected from {}", connection_id, remote_addr);
        Some(connection_id)
    }

    pub fn remove(&self, connection_id: ConnectionId) -> Option<ClientConnection> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(
            "Observer {} removed after {:?}",
            connection_id,
            connection.uptime()
        );
        Some(connection)
    }

    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn test_limit_is_enforced() {
        let manager = ConnectionManager::new(2);
        let first = manager.try_add(addr()).unwrap();
        manager.try_add(addr()).unwrap();
        assert!(manager.try_add(addr()).is_none());
        assert_eq!(manager.connection_count(), 2);

        manager.remove(first).unwrap();
        assert!(manager.try_add(addr()).is_some());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let manager = ConnectionManager::new(4);
        let id = manager.try_add(addr()).unwrap();

        assert_eq!(manager.remove(id).unwrap().remote_addr, addr());
        assert!(manager.remove(id).is_none());
        assert_eq!(manager.connection_count(), 0);
    }
}
