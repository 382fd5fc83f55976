//! Connection management for observer connections.
//!
//! Tracks every open WebSocket connection and enforces the connection
//! limit. Delivery itself happens in the per-connection tasks spawned by
//! the server handlers.

pub mod client;
pub mod manager;

pub use client::ClientConnection;
pub use manager::ConnectionManager;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one observer connection for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
