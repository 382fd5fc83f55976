//! # Loot Server
//!
//! Real-time front end for a [`loot_core`] raid: a single-writer
//! [`LootCouncil`] that owns the raid session and loot history, a
//! [`BroadcastHub`] that fans state changes out, and a WebSocket server
//! through which operators send commands and viewers follow along.
//!
//! ## Protocol
//!
//! Clients send `{ "namespace", "event", "data" }`:
//!
//! | Command | Payload |
//! |---|---|
//! | `raid:start` | `{boss, participants, raid_size?}` |
//! | `raid:set_boss` | `{boss}` |
//! | `raid:end` | none |
//! | `raid:status` | none |
//! | `raid:sessions` | `{raid_size?, boss?, since?, until?}` |
//! | `loot:assign` | `{item, player, boss?, slot?, timestamp?}` |
//! | `loot:history` | `{player?, item_type?, raid_size?}` |
//! | `loot:stats` | none |
//! | `items:list` | `{slot?, token?}` |
//! | `priorities:get` | `{token_type?, stat?, role?}` |
//! | `players:list` | none |
//!
//! The server sends `{ "type", "data", "timestamp" }`. A new connection
//! receives `connection` and then `snapshot`; afterwards it gets
//! `raid_status`, `loot_assignment` and `priorities` events as well as a
//! `response` or `error` for each of its own commands.

pub mod config;
pub mod connection;
pub mod council;
pub mod error;
pub mod hub;
pub mod messaging;
pub mod server;

pub use config::ServerConfig;
pub use council::{CouncilSnapshot, LootCouncil};
pub use error::{DeliveryError, ServerError};
pub use hub::{BroadcastHub, Delivery, ServerEvent, Subscription};
pub use server::LootServer;
