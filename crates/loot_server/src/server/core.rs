//! Core loot server implementation.
//!
//! `LootServer` binds the listener, accepts WebSocket observers and hands
//! each one to [`handle_connection`](super::handlers::handle_connection).
//! All raid state lives in the shared [`LootCouncil`].

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    council::LootCouncil,
    error::ServerError,
    server::handlers::handle_connection,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The WebSocket front of a loot council.
///
/// # Architecture
///
/// * **Loot council**: single-writer owner of session, history and scoring
/// * **Broadcast hub**: reached through the council, fans events out
/// * **Connection management**: connection tracking and the connection limit
/// * **Shutdown channel**: stops the accept loop and closes every observer
pub struct LootServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Shared raid state and command handling
    council: Arc<LootCouncil>,

    /// Tracks open observer connections
    connection_manager: Arc<ConnectionManager>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl LootServer {
    /// Creates a new server around an existing council.
    ///
    /// # Arguments
    ///
    /// * `config` - Network settings
    /// * `council` - The coordinator whose state this server exposes
    pub fn new(config: ServerConfig, council: Arc<LootCouncil>) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new(config.max_connections));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            council,
            connection_manager,
            shutdown_sender,
        }
    }

    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Binds the configured address.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        socket
            .bind(&addr.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        std_listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))?;

        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!("✅ Listener bound on {}", local.unwrap_or(addr));
        Ok(listener)
    }

    /// Binds and serves until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting loot server on {}", self.config.bind_address);
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accepts observers on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let connection_manager = self.connection_manager.clone();
                        let council = self.council.clone();
                        let config = self.config.clone();
                        let shutdown = self.shutdown_sender.subscribe();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, connection_manager, council, config, shutdown).await
                            {
                                error!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(
            "🧹 Server stopped with {} observer(s) closing",
            self.connection_manager.connection_count()
        );
        Ok(())
    }

    /// Stops the accept loop and closes every observer connection.
    pub fn shutdown(&self) {
        info!("🛑 Server shutdown requested");
        if self.shutdown_sender.send(()).is_err() {
            warn!("Shutdown requested but the server is not running");
        }
    }
}
