//! Server implementation.
//!
//! [`LootServer`] owns the listener and the accept loop; the handlers
//! module runs one observer connection from handshake to close.

pub mod core;
pub mod handlers;

pub use self::core::LootServer;
