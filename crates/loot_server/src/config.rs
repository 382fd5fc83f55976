//! Server configuration.

use std::net::SocketAddr;

/// Runtime parameters for the WebSocket server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: SocketAddr,
    /// Maximum number of concurrent observer connections
    pub max_connections: usize,
    /// Upper bound on a single send to one observer, in milliseconds
    pub send_timeout_ms: u64,
    /// Events buffered per observer before it is resynchronised with a snapshot
    pub event_buffer: usize,
    /// Delay clients should wait before reconnecting, in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            send_timeout_ms: 5000,
            event_buffer: 256,
            reconnect_delay_ms: 3000,
        }
    }
}
