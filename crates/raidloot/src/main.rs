//! Raid loot server entry point.
//!
//! Loads configuration, sets up logging, loads the roster, history and
//! attendance from the data directory, and serves the loot council over
//! WebSockets until a termination signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Context, Result};
use cli::CliArgs;
use config::{AppConfig, ConfigOrigin};
use loot_core::JsonLootStore;
use loot_server::{BroadcastHub, LootCouncil, LootServer};
use std::sync::Arc;
use tracing::{error, info};

/// The configured server, ready to run.
struct Application {
    config: AppConfig,
    server: Arc<LootServer>,
}

impl Application {
    /// Loads configuration and data and builds the server.
    async fn new(args: CliArgs) -> Result<Self> {
        let (mut config, origin) = AppConfig::load_from_file(&args.config_path)
            .await
            .with_context(|| format!("Failed to load {}", args.config_path.display()))?;

        if let Some(data_dir) = args.data_dir {
            config.data.directory = data_dir.to_string_lossy().to_string();
        }
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
        logging::setup_logging(&config.logging, args.json_logs)?;
        if origin == ConfigOrigin::CreatedDefault {
            info!("📝 Created default configuration file: {}", args.config_path.display());
        }

        let server_config = config.to_server_config()?;
        let store = Arc::new(JsonLootStore::new(config.data_directory()));
        let hub = Arc::new(BroadcastHub::new(server_config.event_buffer));
        let council = LootCouncil::load(store, config.scoring, hub)
            .await
            .context("Failed to load raid data")?;

        info!(
            "📂 Config: {} | Data: {}",
            args.config_path.display(),
            config.data.directory
        );
        let server = Arc::new(LootServer::new(server_config, Arc::new(council)));
        Ok(Self { config, server })
    }

    /// Serves until a shutdown signal, then stops the server.
    async fn run(self) -> Result<()> {
        info!("🌟 Starting raid loot server");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  ⚖️ Scoring: attendance {} | item penalty {} | token reduction {}",
            self.config.scoring.attendance_weight,
            self.config.scoring.item_penalty,
            self.config.scoring.token_penalty_reduction
        );

        let server = self.server.clone();
        let mut server_handle = tokio::spawn(async move { server.start().await });

        tokio::select! {
            result = &mut server_handle => {
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(anyhow!("Server error: {e}")),
                    Err(e) => Err(anyhow!("Server task failed: {e}")),
                };
            }
            signal = signals::wait_for_shutdown_signal() => {
                signal.context("Failed to listen for shutdown signals")?;
                info!("🛑 Shutdown signal received, stopping server...");
            }
        }

        self.server.shutdown();
        match server_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Server stopped with error: {}", e),
            Err(e) => error!("Server task failed: {}", e),
        }

        info!("✅ Raid loot server shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}
