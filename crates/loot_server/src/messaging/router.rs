//! Dispatches client commands to the loot council.

use crate::{council::LootCouncil, error::ServerError, messaging::ClientMessage};
use loot_core::{
    AssignLoot, HistoryQuery, ItemQuery, ItemSlot, ItemType, PriorityFilters, RaidSize, SessionQuery, StartRaid,
    Timestamp,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SetBossRequest {
    boss: String,
}

#[derive(Debug, Default, Deserialize)]
struct PrioritiesRequest {
    #[serde(default, alias = "tokenType")]
    token_type: Option<String>,
    #[serde(default)]
    stat: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryRequest {
    #[serde(default)]
    player: Option<String>,
    #[serde(default)]
    item_type: Option<String>,
    #[serde(default)]
    raid_size: Option<u8>,
}

impl HistoryRequest {
    /// Unrecognised values are dropped rather than rejected, like priority filters.
    fn into_query(self) -> HistoryQuery {
        HistoryQuery {
            player: self.player.filter(|p| !p.trim().is_empty()),
            item_type: self.item_type.and_then(|t| t.parse::<ItemType>().ok()),
            raid_size: self.raid_size.and_then(|s| RaidSize::try_from(s).ok()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemsRequest {
    #[serde(default)]
    slot: Option<String>,
    #[serde(default)]
    token: Option<bool>,
}

impl ItemsRequest {
    fn into_query(self) -> ItemQuery {
        ItemQuery {
            slot: self.slot.and_then(|s| s.parse::<ItemSlot>().ok()),
            token: self.token,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionsRequest {
    #[serde(default)]
    raid_size: Option<u8>,
    #[serde(default)]
    boss: Option<String>,
    #[serde(default)]
    since: Option<Timestamp>,
    #[serde(default)]
    until: Option<Timestamp>,
}

impl SessionsRequest {
    fn into_query(self) -> SessionQuery {
        SessionQuery {
            raid_size: self.raid_size.and_then(|s| RaidSize::try_from(s).ok()),
            boss: self.boss.filter(|b| !b.trim().is_empty()),
            since: self.since,
            until: self.until,
        }
    }
}

/// Parses a raw client message and runs the command it names.
///
/// # Arguments
///
/// * `message` - A parsed `{namespace, event, data}` message
/// * `council` - The coordinator that owns raid state
///
/// # Returns
///
/// The JSON payload for a `response` message, or a `ServerError` that the
/// caller reports to the client as an `error` message.
pub async fn route_client_message(message: ClientMessage, council: &LootCouncil) -> Result<Value, ServerError> {
    debug!("📨 Routing '{}'", message.command());

    match (message.namespace.as_str(), message.event.as_str()) {
        ("raid", "start") => {
            let command: StartRaid = parse_data(message.data)?;
            to_value(&council.start_raid(command).await?)
        }
        ("raid", "set_boss") => {
            let request: SetBossRequest = parse_data(message.data)?;
            to_value(&council.set_boss(&request.boss).await?)
        }
        ("raid", "end") => to_value(&council.end_raid().await?),
        ("raid", "status") => to_value(&council.session().await),
        ("raid", "sessions") => {
            let request: SessionsRequest = parse_data(message.data)?;
            to_value(&council.sessions(&request.into_query()).await?)
        }
        ("loot", "assign") => {
            let command: AssignLoot = parse_data(message.data)?;
            to_value(&council.assign_loot(command).await?)
        }
        ("loot", "history") => {
            let request: HistoryRequest = parse_data(message.data)?;
            to_value(&council.history(&request.into_query()).await)
        }
        ("loot", "stats") => to_value(&council.stats().await),
        ("items", "list") => {
            let request: ItemsRequest = parse_data(message.data)?;
            to_value(&council.items(&request.into_query()).await)
        }
        ("priorities", "get") => {
            let request: PrioritiesRequest = parse_data(message.data)?;
            let filters = PriorityFilters::parse(
                request.token_type.as_deref(),
                request.stat.as_deref(),
                request.role.as_deref(),
            );
            to_value(&council.priorities(&filters).await)
        }
        ("players", "list") => to_value(&council.players()),
        _ => Err(ServerError::Protocol(format!("Unknown command '{}'", message.command()))),
    }
}

/// Deserialises a command payload; a missing payload reads as `{}`.
fn parse_data<T: DeserializeOwned>(data: Value) -> Result<T, ServerError> {
    let data = if data.is_null() { Value::Object(Default::default()) } else { data };
    serde_json::from_value(data).map_err(|e| ServerError::Protocol(format!("Invalid payload: {e}")))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ServerError> {
    serde_json::to_value(value).map_err(|e| ServerError::Internal(format!("Failed to encode response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::BroadcastHub;
    use loot_core::{AttendanceTable, LootError, MemoryLootStore, Player, Role, ValidationError};
    use serde_json::json;
    use std::sync::Arc;

    async fn council() -> LootCouncil {
        let store = Arc::new(MemoryLootStore::new(
            vec![
                Player::new("Alice", "Warrior", "Protection", Role::Tank),
                Player::new("Bob", "Rogue", "Combat", Role::Dps),
            ],
            Vec::new(),
            AttendanceTable::from_counts([("Alice", 4), ("Bob", 4)]),
        ));
        LootCouncil::load(store, Default::default(), Arc::new(BroadcastHub::new(8)))
            .await
            .unwrap()
    }

    fn message(namespace: &str, event: &str, data: Value) -> ClientMessage {
        ClientMessage {
            namespace: namespace.to_string(),
            event: event.to_string(),
            data,
        }
    }

    #[tokio::test]
    async fn test_routes_raid_commands() {
        let council = council().await;

        let reply = route_client_message(
            message("raid", "start", json!({"boss": "Ultraxion", "participants": ["Alice", "Bob"], "raid_size": 10})),
            &council,
        )
        .await
        .unwrap();
        assert_eq!(reply["active"], true);
        assert_eq!(reply["raid_size"], 10);

        let reply = route_client_message(message("raid", "set_boss", json!({"boss": "Deathwing"})), &council)
            .await
            .unwrap();
        assert_eq!(reply["current_boss"], "Deathwing");

        let reply = route_client_message(
            message("loot", "assign", json!({"item": "Crown of the Corrupted Protector", "player": "Alice"})),
            &council,
        )
        .await
        .unwrap();
        assert_eq!(reply["loot_assignments"][0]["item_type"], "token");
        assert_eq!(reply["loot_assignments"][0]["boss"], "Deathwing");

        let reply = route_client_message(message("raid", "end", Value::Null), &council)
            .await
            .unwrap();
        assert_eq!(reply["active"], false);

        let reply = route_client_message(message("loot", "stats", Value::Null), &council)
            .await
            .unwrap();
        assert_eq!(reply["total_items"], 1);
    }

    #[tokio::test]
    async fn test_priorities_with_unknown_filter_values() {
        let council = council().await;
        let reply = route_client_message(
            message("priorities", "get", json!({"token_type": "Unobtainium", "role": "DPS"})),
            &council,
        )
        .await
        .unwrap();

        let entries = reply.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["player"], "Bob");
    }

    #[tokio::test]
    async fn test_history_query_ignores_bad_values() {
        let council = council().await;
        let reply = route_client_message(
            message("loot", "history", json!({"item_type": "relic", "raid_size": 40})),
            &council,
        )
        .await
        .unwrap();
        assert_eq!(reply, json!([]));
    }

    #[tokio::test]
    async fn test_rejections_are_typed() {
        let council = council().await;

        let error = route_client_message(message("loot", "assign", json!({"item": "Sword", "player": "Bob"})), &council)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ServerError::Loot(LootError::Validation(ValidationError::NoActiveRaid))
        ));
        assert_eq!(error.kind(), "validation");

        let error = route_client_message(
            message("raid", "start", json!({"boss": "Deathwing", "participants": ["Zed"]})),
            &council,
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), "not_found");

        let error = route_client_message(message("raid", "start", json!({"boss": 7})), &council)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "protocol");

        let error = route_client_message(message("raid", "dance", Value::Null), &council)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_items_and_sessions() {
        let council = council().await;
        for data in [
            json!({"boss": "Morchok", "participants": ["Alice", "Bob"], "raid_size": 10}),
            json!({"boss": "Deathwing", "participants": ["Alice", "Bob"]}),
        ] {
            route_client_message(message("raid", "start", data), &council).await.unwrap();
            route_client_message(
                message("loot", "assign", json!({"item": "Gauntlets of the Corrupted Protector", "player": "Alice"})),
                &council,
            )
            .await
            .unwrap();
            route_client_message(message("raid", "end", Value::Null), &council).await.unwrap();
        }

        let reply = route_client_message(message("items", "list", json!({"slot": "hands", "token": true})), &council)
            .await
            .unwrap();
        assert_eq!(reply.as_array().unwrap().len(), 1);
        assert_eq!(reply[0]["token_type"], "Protector");

        let reply = route_client_message(message("items", "list", json!({"token": false})), &council)
            .await
            .unwrap();
        assert_eq!(reply, json!([]));

        let reply = route_client_message(message("raid", "sessions", json!({"raid_size": 10})), &council)
            .await
            .unwrap();
        assert_eq!(reply.as_array().unwrap().len(), 1);
        assert_eq!(reply[0]["boss"], "Morchok");

        let reply = route_client_message(message("raid", "sessions", Value::Null), &council)
            .await
            .unwrap();
        assert_eq!(reply.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_players_list() {
        let council = council().await;
        let reply = route_client_message(message("players", "list", Value::Null), &council)
            .await
            .unwrap();
        assert_eq!(reply.as_array().unwrap().len(), 2);
        assert_eq!(reply[0]["token_type"], "Protector");
    }
}
