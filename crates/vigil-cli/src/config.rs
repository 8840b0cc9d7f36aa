//! Settings resolution: file, then command-line overrides.

use std::fs;

use anyhow::{Context, Result};
use vigil_axum::ServerConfig;
use vigil_core::{MonitorSettings, validate_settings};

use crate::parser::Cli;

/// Load monitor settings from `--config` (or defaults) and apply overrides.
pub fn load_settings(cli: &Cli) -> Result<MonitorSettings> {
    let mut settings = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            MonitorSettings::from_json_str(&raw)
                .with_context(|| format!("Invalid settings file {}", path.display()))?
        }
        None => MonitorSettings::default(),
    };

    if let Some(secs) = cli.poll_interval {
        settings.poll_interval_secs = secs;
    }
    if cli.no_discovery_suppression {
        settings.suppress_discovery = false;
    }

    validate_settings(&settings)?;
    Ok(settings)
}

/// HTTP server settings from the command line.
pub fn server_config(cli: &Cli) -> ServerConfig {
    let config = ServerConfig::new(cli.listen);
    if cli.cors_origins.is_empty() {
        config
    } else {
        config.with_allowed_origins(cli.cors_origins.clone())
    }
}
