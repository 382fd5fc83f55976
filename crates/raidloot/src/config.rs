//! Configuration management for the raid loot server.
//!
//! This module handles loading, validation, and conversion of the
//! application configuration from TOML files.

use loot_core::ScoringConfig;
use loot_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Where players, history, attendance and raid logs live
    #[serde(default)]
    pub data: DataSettings,
    /// Priority score weights
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent observer connections
    pub max_connections: usize,
    /// Upper bound on one send to one observer, in milliseconds
    pub send_timeout_ms: u64,
    /// Events buffered per observer before it is resynchronised
    pub event_buffer: usize,
    /// Reconnect delay advertised to clients, in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1000,
            send_timeout_ms: 5000,
            event_buffer: 256,
            reconnect_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub directory: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            directory: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// No file existed; defaults were written to the path
    CreatedDefault,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration and where it came from, or an
    /// error if loading/creation failed. Runs before logging is set up, so
    /// the caller reports the origin.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<(Self, ConfigOrigin)> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok((config, ConfigOrigin::File))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            Ok((default_config, ConfigOrigin::CreatedDefault))
        }
    }

    /// Converts the `[server]` section into the server's own settings.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            send_timeout_ms: self.server.send_timeout_ms,
            event_buffer: self.server.event_buffer,
            reconnect_delay_ms: self.server.reconnect_delay_ms,
        })
    }

    pub fn data_directory(&self) -> PathBuf {
        PathBuf::from(&self.data.directory)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }
        if self.server.max_connections == 0 {
            return Err("max_connections must be greater than zero".to_string());
        }
        if self.server.event_buffer == 0 {
            return Err("event_buffer must be greater than zero".to_string());
        }
        if self.server.send_timeout_ms == 0 {
            return Err("send_timeout_ms must be greater than zero".to_string());
        }

        if self.data.directory.trim().is_empty() {
            return Err("Data directory cannot be empty".to_string());
        }

        let scoring = &self.scoring;
        for (name, value) in [
            ("attendance_weight", scoring.attendance_weight),
            ("item_penalty", scoring.item_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        for (name, value) in [
            ("token_penalty_reduction", scoring.token_penalty_reduction),
            ("tank_penalty", scoring.tank_penalty),
            ("healer_penalty", scoring.healer_penalty),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(format!("{name} must be in [0, 1), got {value}"));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
