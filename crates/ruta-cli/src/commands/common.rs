//! Helpers shared by commands.

use std::path::Path;

use anyhow::Context;
use ruta_config::{RutaConfig, find_config, validate_config};

/// Load the config named on the command line, else the first `ruta.toml`
/// found in the config directories, else the defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<RutaConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(None),
    };
    let Some(path) = path else {
        tracing::debug!("no config file found, using built-in catalog");
        return Ok(RutaConfig::default());
    };

    let config = RutaConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), devices = config.devices.len(), "config loaded");
    Ok(config)
}
