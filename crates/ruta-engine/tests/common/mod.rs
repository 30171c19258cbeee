//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ruta_config::RutaConfig;
use ruta_core::{DeviceAttributes, DeviceId, MediaConfig, StreamAttributes, StreamType};
use ruta_engine::{ResourceCoordinator, Stream, create_stream};
use ruta_hal::{SimBackend, Subject};

/// Coordinator over the built-in catalog with no offline backoff.
pub fn setup() -> (Arc<ResourceCoordinator>, SimBackend) {
    setup_with(RutaConfig::default().with_backoff_ms(0))
}

pub fn setup_with(config: RutaConfig) -> (Arc<ResourceCoordinator>, SimBackend) {
    let sim = SimBackend::new();
    let rm = ResourceCoordinator::new(
        config,
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
    );
    (rm, sim)
}

pub fn dev(id: DeviceId) -> DeviceAttributes {
    DeviceAttributes::new(id)
}

pub fn playback(rm: &Arc<ResourceCoordinator>, stream_type: StreamType, devices: &[DeviceId]) -> Arc<Stream> {
    let attrs = StreamAttributes::playback(stream_type, MediaConfig::default());
    let devices: Vec<_> = devices.iter().copied().map(dev).collect();
    create_stream(rm, &attrs, &devices, &[]).unwrap()
}

pub fn capture(rm: &Arc<ResourceCoordinator>, stream_type: StreamType, devices: &[DeviceId]) -> Arc<Stream> {
    let attrs = StreamAttributes::capture(stream_type, MediaConfig::pcm(48000, 16, 1));
    let devices: Vec<_> = devices.iter().copied().map(dev).collect();
    create_stream(rm, &attrs, &devices, &[]).unwrap()
}

/// A low-latency playback stream, opened and started.
pub fn running(rm: &Arc<ResourceCoordinator>, devices: &[DeviceId]) -> Arc<Stream> {
    let stream = playback(rm, StreamType::LowLatency, devices);
    stream.open().unwrap();
    stream.start().unwrap();
    stream
}

pub fn device(id: DeviceId) -> Subject {
    Subject::Device { id }
}

pub fn session(stream: &Stream) -> Subject {
    Subject::Session { stream: stream.id() }
}
