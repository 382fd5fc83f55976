//! Error types for the loot server.

use crate::connection::ConnectionId;
use loot_core::LootError;
use thiserror::Error;

/// Errors surfaced by the server to its callers.
///
/// * **Network** - binding, accepting and handshake failures
/// * **Protocol** - malformed client messages
/// * **Loot** - rejected commands and store failures from the core
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Loot(#[from] LootError),
}

impl ServerError {
    /// Category reported to clients in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Network(_) => "network",
            ServerError::Protocol(_) => "protocol",
            ServerError::Internal(_) => "internal",
            ServerError::Loot(e) => e.kind(),
        }
    }
}

/// A single observer could not be sent a message.
///
/// Delivery errors are logged and the observer dropped; they never reach
/// the command that triggered the broadcast.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Send to observer {0} timed out")]
    Timeout(ConnectionId),

    #[error("Send to observer {0} failed: {1}")]
    Send(ConnectionId, String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
