//! Per-connection handling.
//!
//! Each connection runs two tasks. The writer is the only owner of the
//! WebSocket sink: it forwards hub frames and command replies, bounding
//! every send by the configured timeout. The reader parses client commands
//! and hands replies to the writer through a bounded channel.

use crate::{
    config::ServerConfig,
    connection::{ConnectionId, ConnectionManager},
    council::LootCouncil,
    error::{DeliveryError, ServerError},
    hub::Delivery,
    messaging::{route_client_message, ClientMessage, CommandResponse, ConnectionInfo, ErrorResponse, ServerMessage},
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Write half of one observer connection.
struct Outbound {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    connection_id: ConnectionId,
    send_timeout: Duration,
}

impl Outbound {
    async fn send(&mut self, message: Message) -> Result<(), DeliveryError> {
        match timeout(self.send_timeout, self.sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Send(self.connection_id, e.to_string())),
            Err(_) => Err(DeliveryError::Timeout(self.connection_id)),
        }
    }

    async fn send_message<T: Serialize>(&mut self, kind: &str, data: &T) -> Result<(), DeliveryError> {
        let json = ServerMessage::new(kind, data).to_json()?;
        self.send(Message::text(json)).await
    }

    async fn close(&mut self) {
        if let Ok(Err(e)) = timeout(self.send_timeout, self.sink.close()).await {
            debug!("Close handshake with {} failed: {}", self.connection_id, e);
        }
    }
}

/// Handles a single observer connection from accept to disconnect.
///
/// # Arguments
///
/// * `stream` - The accepted TCP stream
/// * `addr` - The remote address of the client
/// * `connection_manager` - Tracks open connections and the connection limit
/// * `council` - Source of snapshots and target of client commands
/// * `config` - Timeouts and buffer sizes
/// * `shutdown` - Fires when the server is stopping
///
/// # Connection Lifecycle
///
/// 1. Refuse the connection if the limit is reached
/// 2. Complete the WebSocket handshake
/// 3. Subscribe to the hub and send `connection` followed by `snapshot`
/// 4. Forward events and command replies until either side closes
/// 5. Unregister the connection
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    council: Arc<LootCouncil>,
    config: ServerConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let Some(connection_id) = connection_manager.try_add(addr) else {
        warn!(
            "🚫 Refusing connection from {}: {} observers already connected",
            addr,
            connection_manager.max_connections()
        );
        return Ok(());
    };

    let result = serve_observer(stream, connection_id, council, &config, shutdown).await;
    connection_manager.remove(connection_id);
    info!("👋 Observer {} disconnected", connection_id);
    result
}

async fn serve_observer(
    stream: TcpStream,
    connection_id: ConnectionId,
    council: Arc<LootCouncil>,
    config: &ServerConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;
    let (ws_sender, mut ws_receiver) = ws_stream.split();

    let mut outbound = Outbound {
        sink: ws_sender,
        connection_id,
        send_timeout: Duration::from_millis(config.send_timeout_ms),
    };

    // Subscription and snapshot are taken together, so the first event
    // delivered is the first change after the snapshot.
    let (mut subscription, snapshot) = council.subscribe().await;
    let greeting = ConnectionInfo {
        connection_id: connection_id.to_string(),
        reconnect_delay_ms: config.reconnect_delay_ms,
    };
    let greeted = match outbound.send_message("connection", &greeting).await {
        Ok(()) => outbound.send_message("snapshot", &snapshot).await,
        Err(e) => Err(e),
    };
    if let Err(e) = greeted {
        warn!("⚠️ Dropping observer {}: {}", connection_id, e);
        return Ok(());
    }

    let (reply_sender, mut reply_receiver) = mpsc::channel::<Message>(config.event_buffer.max(1));

    let writer_council = council.clone();
    let mut writer = tokio::spawn(async move {
        loop {
            let sent = tokio::select! {
                delivery = subscription.next() => match delivery {
                    Delivery::Frame(frame) => outbound.send(Message::text(frame.to_string())).await,
                    Delivery::Lagged(missed) => {
                        warn!("🐢 Observer {} missed {} events, resynchronising", connection_id, missed);
                        let snapshot = writer_council.resync(&mut subscription).await;
                        outbound.send_message("snapshot", &snapshot).await
                    }
                    Delivery::Closed => break,
                },
                reply = reply_receiver.recv() => match reply {
                    Some(message) => outbound.send(message).await,
                    None => break,
                },
            };

            if let Err(e) = sent {
                warn!("⚠️ Dropping observer {}: {}", connection_id, e);
                break;
            }
        }
        outbound.close().await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            let reply = match message {
                Ok(Message::Text(text)) => handle_text(text.as_str(), &council).await,
                Ok(Message::Ping(data)) => Message::Pong(data),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Read from observer {} failed: {}", connection_id, e);
                    break;
                }
            };
            if reply_sender.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {
            if let Err(e) = writer.await {
                error!("Writer task for {} failed: {}", connection_id, e);
            }
        }
        _ = shutdown.recv() => {
            reader.abort();
            if let Err(e) = writer.await {
                error!("Writer task for {} failed: {}", connection_id, e);
            }
        }
    }

    Ok(())
}

/// Runs one client command and builds the reply message.
async fn handle_text(text: &str, council: &LootCouncil) -> Message {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return error_reply(None, ServerError::Protocol(format!("Invalid JSON: {e}"))),
    };

    let request = message.command();
    match route_client_message(message, council).await {
        Ok(data) => {
            let response = CommandResponse::success(request, data);
            encode_reply("response", &response)
        }
        Err(e) => error_reply(Some(request), e),
    }
}

fn error_reply(request: Option<String>, error: ServerError) -> Message {
    debug!("Replying with error: {}", error);
    let response = ErrorResponse {
        request,
        kind: error.kind(),
        message: error.to_string(),
    };
    encode_reply("error", &response)
}

fn encode_reply<T: Serialize>(kind: &str, data: &T) -> Message {
    match ServerMessage::new(kind, data).to_json() {
        Ok(json) => Message::text(json),
        Err(e) => {
            error!("Failed to encode {} reply: {}", kind, e);
            Message::text(r#"{"type":"error","data":{"kind":"internal","message":"encoding failed"}}"#.to_string())
        }
    }
}
