//! End-to-end tests driving a real server over WebSockets.

use futures::{SinkExt, StreamExt};
use loot_core::{AttendanceTable, JsonLootStore, LootStore, MemoryLootStore, Player, Role, ScoringConfig};
use loot_server::{BroadcastHub, LootCouncil, LootServer, ServerConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn roster() -> Vec<Player> {
    vec![
        Player::new("Alice", "Warrior", "Protection", Role::Tank),
        Player::new("Bob", "Rogue", "Combat", Role::Dps),
        Player::new("Cleo", "Priest", "Holy", Role::Healer),
    ]
}

fn memory_store() -> Arc<MemoryLootStore> {
    Arc::new(MemoryLootStore::new(
        roster(),
        Vec::new(),
        AttendanceTable::from_counts([("Alice", 10), ("Bob", 10), ("Cleo", 8)]),
    ))
}

async fn start_server(store: Arc<dyn LootStore>, max_connections: usize) -> (Arc<LootServer>, SocketAddr, JoinHandle<()>) {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        max_connections,
        send_timeout_ms: 2000,
        event_buffer: 64,
        reconnect_delay_ms: 1500,
    };
    let hub = Arc::new(BroadcastHub::new(config.event_buffer));
    let council = LootCouncil::load(store, ScoringConfig::default(), hub)
        .await
        .expect("council should load");

    let server = Arc::new(LootServer::new(config, Arc::new(council)));
    let listener = server.bind().expect("bind should succeed");
    let addr = listener.local_addr().unwrap();

    let serving = server.clone();
    let handle = tokio::spawn(async move {
        serving.serve(listener).await.expect("server should run");
    });
    (server, addr, handle)
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let message = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
            .expect("read failed");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("server sent invalid JSON");
        }
    }
}

/// Reads until a message of type `kind` arrives, skipping anything else.
async fn recv_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let message = recv_json(client).await;
        if message["type"] == kind {
            return message;
        }
    }
}

/// Connects and consumes the greeting, returning the client and its snapshot.
async fn connect(addr: SocketAddr) -> (Client, Value) {
    let (mut client, _) = connect_async(format!("ws://{addr}")).await.expect("connect should succeed");

    let greeting = recv_json(&mut client).await;
    assert_eq!(greeting["type"], "connection");
    assert_eq!(greeting["data"]["reconnect_delay_ms"], 1500);

    let snapshot = recv_json(&mut client).await;
    assert_eq!(snapshot["type"], "snapshot");
    (client, snapshot)
}

async fn send(client: &mut Client, namespace: &str, event: &str, data: Value) {
    let message = json!({"namespace": namespace, "event": event, "data": data});
    client
        .send(Message::text(message.to_string()))
        .await
        .expect("send should succeed");
}

/// Sends a command and waits for its `response` or `error`.
async fn command(client: &mut Client, namespace: &str, event: &str, data: Value) -> Value {
    send(client, namespace, event, data).await;
    loop {
        let message = recv_json(client).await;
        if message["type"] == "response" || message["type"] == "error" {
            return message;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_late_joiner_receives_active_raid_snapshot() {
    let (_server, addr, _handle) = start_server(memory_store(), 16).await;
    let (mut operator, snapshot) = connect(addr).await;
    assert_eq!(snapshot["data"]["session"]["active"], false);
    assert_eq!(snapshot["data"]["priorities"].as_array().unwrap().len(), 3);

    let reply = command(
        &mut operator,
        "raid",
        "start",
        json!({"boss": "Deathwing", "participants": ["Alice", "Bob"]}),
    )
    .await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["data"]["request"], "raid:start");

    let reply = command(&mut operator, "loot", "assign", json!({"item": "Sword", "player": "Bob"})).await;
    assert_eq!(reply["data"]["data"]["loot_assignments"][0]["player"], "Bob");

    let (_viewer, snapshot) = connect(addr).await;
    let session = &snapshot["data"]["session"];
    assert_eq!(session["active"], true);
    assert_eq!(session["current_boss"], "Deathwing");
    assert_eq!(session["loot_assignments"].as_array().unwrap().len(), 1);
    assert_eq!(session["loot_assignments"][0]["item"], "Sword");
    println!("Late joiner snapshot: {}", snapshot);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_every_observer_sees_events_in_order() {
    let (_server, addr, _handle) = start_server(memory_store(), 16).await;
    let (mut operator, _) = connect(addr).await;
    let (mut first, _) = connect(addr).await;
    let (mut second, _) = connect(addr).await;

    command(&mut operator, "raid", "start", json!({"boss": "Morchok", "participants": ["Alice", "Bob", "Cleo"]})).await;
    command(&mut operator, "loot", "assign", json!({"item": "Crown of the Corrupted Protector", "player": "Alice"})).await;
    command(&mut operator, "raid", "end", Value::Null).await;

    for viewer in [&mut first, &mut second] {
        let mut kinds = Vec::new();
        for _ in 0..5 {
            kinds.push(recv_json(viewer).await["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec!["raid_status", "loot_assignment", "priorities", "raid_status", "priorities"]
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_assignment_updates_broadcast_priorities() {
    let (_server, addr, _handle) = start_server(memory_store(), 16).await;
    let (mut operator, snapshot) = connect(addr).await;
    assert_eq!(snapshot["data"]["priorities"][0]["player"], "Bob");

    let (mut viewer, _) = connect(addr).await;
    command(&mut operator, "raid", "start", json!({"boss": "Deathwing", "participants": ["Alice", "Bob"]})).await;
    command(&mut operator, "loot", "assign", json!({"item": "Sword", "player": "Bob"})).await;

    let assignment = recv_type(&mut viewer, "loot_assignment").await;
    assert_eq!(assignment["data"]["player"], "Bob");
    assert_eq!(assignment["data"]["item_slot"], "weapon");

    let priorities = recv_type(&mut viewer, "priorities").await;
    let bob = priorities["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["player"] == "Bob")
        .unwrap();
    assert_eq!(bob["award_count"], 1);
    assert_ne!(priorities["data"][0]["player"], "Bob");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_raid_writes_history_and_archive() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonLootStore::new(dir.path()));
    tokio::fs::write(
        dir.path().join("players.json"),
        serde_json::to_string(&roster()).unwrap(),
    )
    .await
    .unwrap();

    let (_server, addr, _handle) = start_server(store, 16).await;
    let (mut operator, _) = connect(addr).await;

    command(&mut operator, "raid", "start", json!({"boss": "Deathwing", "participants": ["Bob"], "raid_size": 10})).await;
    command(&mut operator, "loot", "assign", json!({"item": "Sword", "player": "Bob"})).await;
    let reply = command(&mut operator, "raid", "end", Value::Null).await;
    assert_eq!(reply["data"]["data"]["active"], false);

    let history: Vec<Value> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.path().join("loot_history.json")).await.unwrap()).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["player"], "Bob");
    assert_eq!(history[0]["raid_size"], 10);

    let archived = std::fs::read_dir(dir.path().join("raid_logs")).unwrap().count();
    assert_eq!(archived, 1);

    let reply = command(&mut operator, "raid", "end", Value::Null).await;
    assert_eq!(reply["type"], "response");
    let history: Vec<Value> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.path().join("loot_history.json")).await.unwrap()).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_commands_reply_with_errors() {
    let (_server, addr, _handle) = start_server(memory_store(), 16).await;
    let (mut operator, _) = connect(addr).await;

    let reply = command(&mut operator, "loot", "assign", json!({"item": "Sword", "player": "Bob"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["kind"], "validation");
    assert_eq!(reply["data"]["request"], "loot:assign");

    let reply = command(&mut operator, "raid", "start", json!({"boss": "Deathwing", "participants": ["Nobody"]})).await;
    assert_eq!(reply["data"]["kind"], "not_found");

    operator.send(Message::text("not json".to_string())).await.unwrap();
    let reply = recv_type(&mut operator, "error").await;
    assert_eq!(reply["data"]["kind"], "protocol");

    command(&mut operator, "raid", "start", json!({"boss": "Deathwing", "participants": ["Bob"]})).await;
    let reply = command(&mut operator, "loot", "assign", json!({"item": "Sword", "player": "Alice"})).await;
    assert_eq!(reply["data"]["kind"], "validation");

    let status = command(&mut operator, "raid", "status", Value::Null).await;
    assert!(status["data"]["data"]["loot_assignments"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connections_over_limit_are_refused() {
    let (server, addr, _handle) = start_server(memory_store(), 1).await;
    let (_first, _) = connect(addr).await;

    let refused = connect_async(format!("ws://{addr}")).await;
    assert!(refused.is_err());
    assert_eq!(server.connection_manager().connection_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_is_answered() {
    let (_server, addr, _handle) = start_server(memory_store(), 4).await;
    let (mut client, _) = connect(addr).await;

    client.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
    let pong = timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Pong(payload))) => return payload,
                Some(Ok(_)) => continue,
                other => panic!("unexpected message: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for pong");
    assert_eq!(pong.as_ref(), &[1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_closes_observers() {
    let (server, addr, handle) = start_server(memory_store(), 4).await;
    let (mut client, _) = connect(addr).await;

    server.shutdown();
    timeout(WAIT, handle).await.expect("server should stop").unwrap();

    let closed = timeout(WAIT, async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
