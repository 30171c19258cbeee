//! Top-level configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::catalog::DeviceCatalog;
use crate::error::ConfigError;

/// Behavior while the audio subsystem is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Sleep applied before a lifecycle call fails with hardware-offline.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    10
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RecoveryConfig {
    /// Backoff as a duration.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Default transfer buffer sizing per stream kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferDefaults {
    /// Compressed offload fragment size in bytes.
    #[serde(default = "default_compress_fragment_size")]
    pub compress_fragment_size: usize,
    /// Compressed offload fragment count.
    #[serde(default = "default_compress_fragment_count")]
    pub compress_fragment_count: usize,
    /// PCM period size in bytes.
    #[serde(default = "default_pcm_period_size")]
    pub pcm_period_size: usize,
    /// PCM period count.
    #[serde(default = "default_pcm_period_count")]
    pub pcm_period_count: usize,
}

fn default_compress_fragment_size() -> usize {
    32 * 1024
}

fn default_compress_fragment_count() -> usize {
    4
}

fn default_pcm_period_size() -> usize {
    3840
}

fn default_pcm_period_count() -> usize {
    4
}

impl Default for BufferDefaults {
    fn default() -> Self {
        Self {
            compress_fragment_size: default_compress_fragment_size(),
            compress_fragment_count: default_compress_fragment_count(),
            pcm_period_size: default_pcm_period_size(),
            pcm_period_count: default_pcm_period_count(),
        }
    }
}

/// Runtime configuration of the routing engine.
///
/// # TOML Format
///
/// ```toml
/// [recovery]
/// backoff_ms = 10
///
/// [buffers]
/// compress_fragment_size = 32768
/// compress_fragment_count = 4
///
/// [[devices]]
/// id = "out_speaker"
/// backend = "wsa_codec_dma_rx0"
///
/// [[devices]]
/// id = "out_bluetooth_a2dp"
/// backend = "btfm_a2dp_rx"
/// ready = false
/// ```
///
/// A file without any `[[devices]]` table gets the built-in catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RutaConfig {
    /// Offline recovery behavior.
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Buffer defaults.
    #[serde(default)]
    pub buffers: BufferDefaults,
    /// Device catalog.
    #[serde(default = "DeviceCatalog::builtin")]
    pub devices: DeviceCatalog,
}

impl Default for RutaConfig {
    fn default() -> Self {
        Self {
            recovery: RecoveryConfig::default(),
            buffers: BufferDefaults::default(),
            devices: DeviceCatalog::builtin(),
        }
    }
}

impl RutaConfig {
    /// Config with default settings and the given catalog.
    pub fn with_catalog(devices: DeviceCatalog) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Set the offline backoff.
    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.recovery.backoff_ms = backoff_ms;
        self
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the config to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
