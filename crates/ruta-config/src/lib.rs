//! Configuration and device catalog management for ruta.
//!
//! This crate provides the runtime configuration of the routing engine:
//! the recovery backoff applied while the audio subsystem is offline, default
//! buffer sizing per stream kind, and the device catalog that tells the
//! resource coordinator which endpoints exist, which backend each one
//! aliases, whether it is ready, and how it is configured.
//!
//! # Features
//!
//! - **Config files**: Load and save [`RutaConfig`] as TOML
//! - **Device catalog**: [`DeviceCatalog`] with backend grouping and lookup
//! - **Validation**: Reject duplicate ids, empty backends, bad formats
//! - **Paths**: Platform-specific config directories
//! - **Built-in catalog**: A typical handset topology used when a config
//!   file names no devices
//!
//! # Example
//!
//! ```rust,no_run
//! use ruta_config::{RutaConfig, user_config_dir};
//! use ruta_core::DeviceId;
//!
//! let config = RutaConfig::load("ruta.toml").unwrap();
//! let speaker = config.devices.get(DeviceId::OutSpeaker).unwrap();
//! println!("speaker is on backend {}", speaker.backend);
//!
//! config.save(user_config_dir().join("ruta.toml")).unwrap();
//! ```

mod catalog;
mod error;
mod settings;

/// Platform-specific paths for configuration files.
pub mod paths;

/// Configuration validation.
pub mod validation;

pub use catalog::{DeviceCatalog, DeviceEntry};
pub use error::ConfigError;
pub use paths::{
    CONFIG_FILE_NAME, ensure_user_config_dir, find_config, system_config_dir, user_config_dir,
};
pub use settings::{BufferDefaults, RecoveryConfig, RutaConfig};
pub use validation::{ValidationError, ValidationResult, validate_catalog, validate_config};
