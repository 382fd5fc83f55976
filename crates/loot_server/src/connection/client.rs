//! Client connection representation.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// Metadata for one connected observer.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }

    /// How long the connection has been open.
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed().unwrap_or_default()
    }
}
