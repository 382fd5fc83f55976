//! Logging system setup.

use crate::config::LoggingSettings;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. JSON output is
/// used when either the configuration or the command line asks for it.
///
/// # Arguments
/// * `settings` - The `[logging]` section of the configuration
/// * `json_override` - `--json-logs` from the command line
pub fn setup_logging(settings: &LoggingSettings, json_override: bool) -> Result<()> {
    let level = settings.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json_override || settings.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", level);
    Ok(())
}
