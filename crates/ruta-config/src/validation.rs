//! Configuration validation.
//!
//! Parsing only checks shape. These checks reject catalogs the coordinator
//! could not route with: duplicate ids would make backend lookup ambiguous,
//! and the sentinel id must never name an endpoint.
//!
//! # Example
//!
//! ```rust
//! use ruta_config::{RutaConfig, validate_config};
//!
//! validate_config(&RutaConfig::default()).expect("builtin config is valid");
//! ```

use std::collections::HashSet;

use ruta_core::DeviceId;
use thiserror::Error;

use crate::{DeviceCatalog, RutaConfig};

/// Bit widths an endpoint may be configured with.
pub const SUPPORTED_BIT_WIDTHS: [u16; 4] = [8, 16, 24, 32];

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The same id appears twice in the catalog.
    #[error("device {0} is listed more than once")]
    DuplicateDevice(DeviceId),

    /// The `none` sentinel appears in the catalog.
    #[error("the 'none' device cannot be listed in the catalog")]
    SentinelDevice,

    /// A device has no backend.
    #[error("device {0} has an empty backend name")]
    EmptyBackend(DeviceId),

    /// Unsupported native bit width.
    #[error("device {id} has unsupported bit width {bit_width}")]
    UnsupportedBitWidth {
        /// Offending device.
        id: DeviceId,
        /// Configured width.
        bit_width: u16,
    },

    /// Zero sample rate or channel count.
    #[error("device {id} has zero {field}")]
    ZeroFormat {
        /// Offending device.
        id: DeviceId,
        /// `sample_rate` or `channels`.
        field: &'static str,
    },

    /// Zero buffer default.
    #[error("buffer default '{0}' must be non-zero")]
    ZeroBuffer(&'static str),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

fn catalog_errors(catalog: &DeviceCatalog) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for entry in catalog.iter() {
        if entry.id.is_none() {
            errors.push(ValidationError::SentinelDevice);
            continue;
        }
        if !seen.insert(entry.id) {
            errors.push(ValidationError::DuplicateDevice(entry.id));
        }
        if entry.backend.trim().is_empty() {
            errors.push(ValidationError::EmptyBackend(entry.id));
        }
        if !SUPPORTED_BIT_WIDTHS.contains(&entry.bit_width) {
            errors.push(ValidationError::UnsupportedBitWidth {
                id: entry.id,
                bit_width: entry.bit_width,
            });
        }
        if entry.sample_rate == 0 {
            errors.push(ValidationError::ZeroFormat {
                id: entry.id,
                field: "sample_rate",
            });
        }
        if entry.channels == 0 {
            errors.push(ValidationError::ZeroFormat {
                id: entry.id,
                field: "channels",
            });
        }
    }
    errors
}

/// Validate a device catalog.
pub fn validate_catalog(catalog: &DeviceCatalog) -> ValidationResult<()> {
    collect(catalog_errors(catalog))
}

/// Validate a whole config: buffer defaults and catalog.
pub fn validate_config(config: &RutaConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let buffers = &config.buffers;
    for (name, value) in [
        ("compress_fragment_size", buffers.compress_fragment_size),
        ("compress_fragment_count", buffers.compress_fragment_count),
        ("pcm_period_size", buffers.pcm_period_size),
        ("pcm_period_count", buffers.pcm_period_count),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroBuffer(name));
        }
    }
    errors.extend(catalog_errors(&config.devices));
    collect(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceEntry;

    #[test]
    fn builtin_config_is_valid() {
        assert_eq!(validate_config(&RutaConfig::default()), Ok(()));
    }

    #[test]
    fn duplicate_device_rejected() {
        let catalog = DeviceCatalog::new(vec![
            DeviceEntry::new(DeviceId::OutSpeaker, "a"),
            DeviceEntry::new(DeviceId::OutSpeaker, "b"),
        ]);
        assert_eq!(
            validate_catalog(&catalog),
            Err(ValidationError::DuplicateDevice(DeviceId::OutSpeaker))
        );
    }

    #[test]
    fn sentinel_rejected() {
        let catalog = DeviceCatalog::new(vec![DeviceEntry::new(DeviceId::None, "a")]);
        assert_eq!(validate_catalog(&catalog), Err(ValidationError::SentinelDevice));
    }

    #[test]
    fn several_problems_are_collected() {
        let mut bad = DeviceEntry::new(DeviceId::OutHdmi, " ");
        bad.bit_width = 12;
        bad.channels = 0;
        let result = validate_catalog(&DeviceCatalog::new(vec![bad]));
        let Err(ValidationError::Multiple(errors)) = result else {
            panic!("expected multiple errors, got {result:?}");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::EmptyBackend(DeviceId::OutHdmi)));
    }

    #[test]
    fn zero_buffer_default_rejected() {
        let mut config = RutaConfig::default();
        config.buffers.compress_fragment_count = 0;
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::ZeroBuffer("compress_fragment_count"))
        );
    }
}
