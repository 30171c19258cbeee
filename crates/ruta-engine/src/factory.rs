//! Stream construction.

use std::collections::HashSet;
use std::sync::Arc;

use ruta_core::{DeviceAttributes, Error, Modifier, Result, StreamAttributes, StreamDirection};

use crate::ResourceCoordinator;
use crate::stream::{BoundDevice, Stream};

/// Create a stream of the kind `attrs.stream_type` selects, bound to `devices`.
///
/// Requested devices that are `None`, not ready or repeated are skipped.
/// Each remaining device gets its configuration from the catalog, with an
/// echo reference attached for capture streams on devices that carry one.
/// The stream starts `Idle` and is registered with the coordinator.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] when `devices` is empty or none survives
/// - [`Error::HardwareOffline`] while the subsystem is offline
/// - [`Error::Unsupported`] when the stream kind rejects the attributes or
///   a device faces the wrong way
pub fn create_stream(
    coordinator: &Arc<ResourceCoordinator>,
    attrs: &StreamAttributes,
    devices: &[DeviceAttributes],
    modifiers: &[Modifier],
) -> Result<Arc<Stream>> {
    if devices.is_empty() {
        return Err(Error::invalid("a stream needs at least one device"));
    }
    coordinator.fail_if_offline("create stream")?;

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(devices.len());
    for requested in devices {
        let id = requested.id;
        if id.is_none() {
            continue;
        }
        if !coordinator.is_device_ready(id) {
            tracing::warn!(device = %id, "device not ready, skipping");
            continue;
        }
        if !seen.insert(id) {
            continue;
        }
        let mut device = DeviceAttributes::new(id);
        if id.is_addressable() {
            device.address.clone_from(&requested.address);
        }
        let ec_channels = match attrs.direction {
            StreamDirection::Output => 0,
            _ => coordinator.ec_info(id).map_or(0, |ec| ec.channels),
        };
        coordinator.device_config(&mut device, Some(attrs), ec_channels)?;
        resolved.push(device);
    }
    if resolved.is_empty() {
        return Err(Error::invalid("no requested device is usable"));
    }
    if !coordinator.is_stream_supported(attrs, &resolved) {
        return Err(Error::Unsupported(format!(
            "{:?} {:?} stream on {:?}",
            attrs.stream_type,
            attrs.direction,
            resolved.iter().map(|d| d.id).collect::<Vec<_>>()
        )));
    }

    let bound = resolved
        .into_iter()
        .map(|attrs| {
            coordinator
                .acquire_device(&attrs)
                .map(|handle| BoundDevice { handle, attrs })
        })
        .collect::<Result<Vec<_>>>()?;
    let stream = Stream::new(Arc::clone(coordinator), attrs.clone(), bound, modifiers);
    coordinator.register_stream(&stream);
    tracing::info!(
        stream = %stream.id(),
        kind = stream.kind().name(),
        devices = ?stream.device_ids(),
        "stream created"
    );
    Ok(stream)
}
