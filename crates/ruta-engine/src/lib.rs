//! Ruta Engine - stream lifecycle, device routing and subsystem recovery
//!
//! The engine ties the value types of `ruta-core` to the hardware traits of
//! `ruta-hal`:
//!
//! ```text
//!            ┌───────────────────────────────┐
//!            │      ResourceCoordinator      │
//!            │ catalog · pool · bindings ·   │
//!            │ streams · graph/switch locks  │
//!            └──────▲───────────────▲────────┘
//!                   │               │
//!   create_stream ──┤               │ shared handles
//!                   │               │
//!            ┌──────┴──────┐   ┌────┴─────┐
//!            │   Stream    │──▶│  Device  │──▶ DeviceDriver
//!            │ (one lock)  │   │(refcount)│
//!            └──────┬──────┘   └──────────┘
//!                   ▼
//!                Session
//! ```
//!
//! # Core Abstractions
//!
//! - [`ResourceCoordinator`] - Process-wide registry of devices, bindings
//!   and streams; serializes graph edits and device switches
//! - [`Device`] - Reference-counted handle on one physical endpoint
//! - [`Stream`] - Lifecycle state machine bound to devices and a session
//! - [`StreamKind`] - PCM, compressed offload or sound trigger behavior
//! - [`SwitchPlan`] - Disconnect/connect sets computed for a device switch
//! - [`create_stream`] - Validating stream factory
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ruta_config::RutaConfig;
//! use ruta_core::{DeviceAttributes, DeviceId, MediaConfig, StreamAttributes, StreamType};
//! use ruta_engine::{ResourceCoordinator, create_stream};
//! use ruta_hal::SimBackend;
//!
//! let sim = SimBackend::new();
//! let rm = ResourceCoordinator::new(RutaConfig::default(), Arc::new(sim.clone()), Arc::new(sim));
//! let attrs = StreamAttributes::playback(StreamType::LowLatency, MediaConfig::default());
//! let stream = create_stream(&rm, &attrs, &[DeviceAttributes::new(DeviceId::OutSpeaker)], &[]).unwrap();
//!
//! stream.open().unwrap();
//! stream.start().unwrap();
//! stream.switch_device(&[DeviceAttributes::new(DeviceId::OutWiredHeadset)]).unwrap();
//! assert_eq!(stream.device_ids(), vec![DeviceId::OutWiredHeadset]);
//! ```

mod coordinator;
mod device;
mod factory;
mod stream;

pub use coordinator::{Binding, Connect, Disconnect, ResourceCoordinator, SubsystemEvent};
pub use device::Device;
pub use factory::create_stream;
pub use stream::{Stream, StreamCallback, StreamKind, SwitchPlan};
