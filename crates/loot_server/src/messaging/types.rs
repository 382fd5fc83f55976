//! Message type definitions for client-server communication.
//!
//! Clients send `{ "namespace", "event", "data" }`; the server answers and
//! broadcasts `{ "type", "data", "timestamp" }`.

use loot_core::{current_timestamp, Timestamp};
use serde::{Deserialize, Serialize};

/// A message sent from a client to the server.
///
/// # Example
///
/// ```json
/// {
///   "namespace": "loot",
///   "event": "assign",
///   "data": { "item": "Sword", "player": "Bob" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Command group (`raid`, `loot`, `priorities`, `players`)
    pub namespace: String,

    /// The command within the namespace
    pub event: String,

    /// Command payload; may be omitted for commands without arguments
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ClientMessage {
    /// `namespace:event`, used in replies and logs.
    pub fn command(&self) -> String {
        format!("{}:{}", self.namespace, self.event)
    }
}

/// A message sent from the server to a client.
#[derive(Debug, Serialize)]
pub struct ServerMessage<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub data: &'a T,
    pub timestamp: Timestamp,
}

impl<'a, T: Serialize> ServerMessage<'a, T> {
    pub fn new(kind: &'a str, data: &'a T) -> Self {
        Self {
            kind,
            data,
            timestamp: current_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// First message on every connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub reconnect_delay_ms: u64,
}

/// Successful reply to a client command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub request: String,
    pub status: &'static str,
    pub data: serde_json::Value,
}

impl CommandResponse {
    pub fn success(request: String, data: serde_json::Value) -> Self {
        Self {
            request,
            status: "success",
            data,
        }
    }
}

/// Reply to a command that was rejected or could not be parsed.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// The command being answered, when it could be parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    pub kind: &'static str,
    pub message: String,
}
