//! Process-wide resource coordinator.
//!
//! The coordinator is constructed once and shared as
//! `Arc<ResourceCoordinator>` by every stream. It owns:
//!
//! - the device catalog (readiness, backend aliasing, native configuration),
//! - the device pool (one live [`Device`] per id),
//! - the binding table of started `(stream, device)` pairs, which is the only
//!   source of truth for backend sharing,
//! - the stream registry used for subsystem-restart recovery,
//! - the graph lock and the device-switch lock,
//! - the card state flag.
//!
//! ## Lock order
//!
//! ```text
//! device-switch lock ─▶ stream lock ─▶ graph lock ─▶ tables / pool / device
//! ```
//!
//! Table locks are leaf locks: they are never held across a call into a
//! stream, a device or a session.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use ruta_config::{BufferDefaults, DeviceCatalog, RecoveryConfig, RutaConfig};
use ruta_core::{
    DeviceAttributes, DeviceDirection, DeviceId, EcInfo, Error, Result, StreamAttributes, StreamId,
};
use ruta_hal::{DriverFactory, SessionFactory};

use crate::Device;
use crate::stream::{Stream, StreamKind};

/// One started `(stream, device)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Binding {
    /// Stream holding the device.
    pub stream: StreamId,
    /// Device held.
    pub device: DeviceId,
}

/// Notification from the collaborator that watches the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemEvent {
    /// The subsystem crashed; every stream must release its hardware.
    Offline,
    /// The subsystem is back; streams may open again.
    Online,
}

/// Old binding to tear down during a device switch.
#[derive(Debug, Clone)]
pub struct Disconnect {
    /// Stream to detach from.
    pub stream: Arc<Stream>,
    /// Device to detach.
    pub device: DeviceId,
}

/// New binding to build during a device switch.
#[derive(Debug, Clone)]
pub struct Connect {
    /// Stream to attach to.
    pub stream: Arc<Stream>,
    /// Device to attach, with resolved configuration.
    pub device: DeviceAttributes,
}

/// Registry and serialization authority for devices and bindings.
pub struct ResourceCoordinator {
    recovery: RecoveryConfig,
    buffers: BufferDefaults,
    catalog: Mutex<DeviceCatalog>,
    drivers: Arc<dyn DriverFactory>,
    sessions: Arc<dyn SessionFactory>,
    pool: Mutex<HashMap<DeviceId, Weak<Device>>>,
    bindings: Mutex<Vec<Binding>>,
    streams: Mutex<BTreeMap<StreamId, Weak<Stream>>>,
    recovering: Mutex<Vec<Weak<Stream>>>,
    graph_lock: Mutex<()>,
    switch_lock: Mutex<()>,
    offline: AtomicBool,
    a2dp_suspended: AtomicBool,
}

impl std::fmt::Debug for ResourceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCoordinator")
            .field("offline", &self.is_offline())
            .field("bindings", &self.bindings.lock().len())
            .field("streams", &self.streams.lock().len())
            .finish_non_exhaustive()
    }
}

impl ResourceCoordinator {
    /// Create a coordinator over the given catalog and collaborators.
    pub fn new(
        config: RutaConfig,
        drivers: Arc<dyn DriverFactory>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Arc<Self> {
        tracing::info!(
            devices = config.devices.len(),
            backoff_ms = config.recovery.backoff_ms,
            "resource coordinator created"
        );
        Arc::new(Self {
            recovery: config.recovery,
            buffers: config.buffers,
            catalog: Mutex::new(config.devices),
            drivers,
            sessions,
            pool: Mutex::new(HashMap::new()),
            bindings: Mutex::new(Vec::new()),
            streams: Mutex::new(BTreeMap::new()),
            recovering: Mutex::new(Vec::new()),
            graph_lock: Mutex::new(()),
            switch_lock: Mutex::new(()),
            offline: AtomicBool::new(false),
            a2dp_suspended: AtomicBool::new(false),
        })
    }

    // --- catalog ---

    /// Whether `id` is in the catalog and ready.
    pub fn is_device_ready(&self, id: DeviceId) -> bool {
        self.catalog.lock().get(id).is_some_and(|e| e.ready)
    }

    /// Mark `id` ready or not ready. Returns `false` if it is not in the catalog.
    pub fn set_device_ready(&self, id: DeviceId, ready: bool) -> bool {
        let mut catalog = self.catalog.lock();
        match catalog.get_mut(id) {
            Some(entry) => {
                entry.ready = ready;
                tracing::info!(device = %id, ready, "device readiness changed");
                true
            }
            None => false,
        }
    }

    /// Backend `id` is routed over.
    pub fn backend_of(&self, id: DeviceId) -> Option<String> {
        self.catalog.lock().backend_of(id).map(str::to_string)
    }

    /// Snapshot of the catalog.
    pub fn catalog(&self) -> DeviceCatalog {
        self.catalog.lock().clone()
    }

    /// Echo-reference info for capture on `id`.
    pub fn ec_info(&self, id: DeviceId) -> Option<EcInfo> {
        self.catalog.lock().get(id).and_then(|e| e.ec_info())
    }

    /// Resolve the hardware configuration of `attrs` from the catalog.
    ///
    /// Addressable (USB) endpoints follow the stream's format in the
    /// matching direction when stream attributes are given. A non-zero
    /// `ec_channels` attaches an echo reference.
    pub fn device_config(
        &self,
        attrs: &mut DeviceAttributes,
        stream: Option<&StreamAttributes>,
        ec_channels: u16,
    ) -> Result<()> {
        let catalog = self.catalog.lock();
        let entry = catalog
            .get(attrs.id)
            .ok_or_else(|| Error::NoDevice(format!("{} is not in the catalog", attrs.id)))?;
        let mut config = entry.device_config();
        if let Some(stream) = stream
            && attrs.id.is_addressable()
        {
            let media = match attrs.id.direction() {
                Some(DeviceDirection::Input) => stream.in_media,
                _ => stream.out_media,
            };
            config.sample_rate = media.sample_rate;
            config.channels = media.channels;
            config.bit_width = media.bit_width;
        }
        if ec_channels > 0 {
            config.ec_ref = Some(EcInfo {
                channels: ec_channels,
            });
        }
        attrs.config = config;
        Ok(())
    }

    /// Whether a stream of `attrs` may be routed to `devices`.
    pub fn is_stream_supported(&self, attrs: &StreamAttributes, devices: &[DeviceAttributes]) -> bool {
        let kind = StreamKind::for_type(attrs.stream_type);
        if let Err(e) = kind.check_attributes(attrs) {
            tracing::warn!(kind = kind.name(), error = %e, "stream attributes rejected");
            return false;
        }
        devices.iter().all(|d| {
            let ok = d
                .id
                .direction()
                .is_some_and(|dir| attrs.direction.accepts(dir));
            if !ok {
                tracing::warn!(device = %d.id, direction = ?attrs.direction, "device direction mismatch");
            }
            ok
        })
    }

    /// Whether two devices face the same direction.
    pub fn match_dev_dir(&self, a: DeviceId, b: DeviceId) -> bool {
        a.same_direction(b)
    }

    // --- card state ---

    /// Whether the audio subsystem is offline.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Backoff applied before failing a call while offline.
    pub fn recovery(&self) -> RecoveryConfig {
        self.recovery
    }

    /// Buffer sizing defaults.
    pub fn buffer_defaults(&self) -> BufferDefaults {
        self.buffers
    }

    /// Sleep the recovery backoff if offline and report it.
    pub(crate) fn fail_if_offline(&self, op: &'static str) -> Result<()> {
        if self.is_offline() {
            tracing::warn!(op, "audio subsystem offline");
            std::thread::sleep(self.recovery.backoff());
            return Err(Error::HardwareOffline);
        }
        Ok(())
    }

    /// Drive recovery for a subsystem transition.
    ///
    /// `Offline` marks the card offline and runs every registered stream's
    /// down handler; those streams are remembered. `Online` clears the flag
    /// and runs the up handler of every remembered stream still alive. Each
    /// stream recovers independently; failures are logged and the first one
    /// is returned.
    pub fn handle_subsystem_event(&self, event: SubsystemEvent) -> Result<()> {
        let mut first_err = None;
        match event {
            SubsystemEvent::Offline => {
                if self.offline.swap(true, Ordering::AcqRel) {
                    tracing::debug!("subsystem already offline");
                    return Ok(());
                }
                tracing::warn!("audio subsystem offline, releasing streams");
                let streams = self.streams();
                *self.recovering.lock() = streams.iter().map(Arc::downgrade).collect();
                for stream in streams {
                    if let Err(e) = stream.ssr_down_handler() {
                        tracing::error!(stream = %stream.id(), error = %e, "down handler failed");
                        first_err.get_or_insert(e);
                    }
                }
            }
            SubsystemEvent::Online => {
                if !self.offline.swap(false, Ordering::AcqRel) {
                    tracing::debug!("subsystem already online");
                    return Ok(());
                }
                tracing::info!("audio subsystem online, restoring streams");
                let recovering = std::mem::take(&mut *self.recovering.lock());
                for stream in recovering.iter().filter_map(Weak::upgrade) {
                    if let Err(e) = stream.ssr_up_handler() {
                        tracing::error!(stream = %stream.id(), error = %e, "up handler failed");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Record whether the A2DP sink is suspended.
    ///
    /// Suspending mutes every compressed stream currently routed to A2DP; a
    /// later switch of that stream away from A2DP unmutes it.
    pub fn set_a2dp_suspended(&self, suspended: bool) {
        self.a2dp_suspended.store(suspended, Ordering::Release);
        if !suspended {
            return;
        }
        for stream in self.streams() {
            if let Err(e) = stream.mute_for_a2dp_suspend() {
                tracing::warn!(stream = %stream.id(), error = %e, "a2dp suspend mute failed");
            }
        }
    }

    /// Whether the A2DP sink is suspended.
    pub fn is_a2dp_suspended(&self) -> bool {
        self.a2dp_suspended.load(Ordering::Acquire)
    }

    // --- locks ---

    /// Serialize session-graph edits across streams.
    pub(crate) fn lock_graph(&self) -> MutexGuard<'_, ()> {
        self.graph_lock.lock()
    }

    // --- collaborators ---

    pub(crate) fn sessions(&self) -> &Arc<dyn SessionFactory> {
        &self.sessions
    }

    /// Shared handle for `attrs.id`, created on first use.
    pub fn acquire_device(&self, attrs: &DeviceAttributes) -> Result<Arc<Device>> {
        if attrs.id.is_none() {
            return Err(Error::invalid("cannot acquire the 'none' device"));
        }
        let mut pool = self.pool.lock();
        if let Some(device) = pool.get(&attrs.id).and_then(Weak::upgrade) {
            return Ok(device);
        }
        let device = Arc::new(Device::new(attrs.clone(), Arc::clone(&self.drivers)));
        pool.insert(attrs.id, Arc::downgrade(&device));
        tracing::debug!(device = %attrs.id, "device handle created");
        Ok(device)
    }

    /// Live handle for `id`, if any stream holds one.
    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.pool.lock().get(&id).and_then(Weak::upgrade)
    }

    // --- stream registry ---

    /// Register a stream for recovery and cross-stream routing.
    pub fn register_stream(&self, stream: &Arc<Stream>) {
        self.streams
            .lock()
            .insert(stream.id(), Arc::downgrade(stream));
    }

    /// Forget a stream. Returns whether it was registered.
    pub fn deregister_stream(&self, id: StreamId) -> bool {
        self.streams.lock().remove(&id).is_some()
    }

    /// Registered streams still alive, in creation order.
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        let mut streams = self.streams.lock();
        streams.retain(|_, s| s.strong_count() > 0);
        streams.values().filter_map(Weak::upgrade).collect()
    }

    /// Registered stream by id.
    pub fn stream(&self, id: StreamId) -> Option<Arc<Stream>> {
        self.streams.lock().get(&id).and_then(Weak::upgrade)
    }

    // --- binding table ---

    /// Record that `stream` has `device` started.
    pub fn register_device(&self, stream: StreamId, device: &Device) {
        let binding = Binding {
            stream,
            device: device.id(),
        };
        let mut bindings = self.bindings.lock();
        if !bindings.contains(&binding) {
            bindings.push(binding);
            tracing::debug!(%stream, device = %binding.device, "binding registered");
        }
    }

    /// Forget that `stream` has `device` started. Returns whether it was recorded.
    pub fn deregister_device(&self, stream: StreamId, device: DeviceId) -> bool {
        let mut bindings = self.bindings.lock();
        let before = bindings.len();
        bindings.retain(|b| !(b.stream == stream && b.device == device));
        let removed = bindings.len() != before;
        if removed {
            tracing::debug!(%stream, %device, "binding deregistered");
        }
        removed
    }

    /// Snapshot of the binding table, sorted.
    pub fn active_bindings(&self) -> Vec<Binding> {
        let mut bindings = self.bindings.lock().clone();
        bindings.sort();
        bindings
    }

    /// Whether any stream has `device` started.
    pub fn is_device_active(&self, device: DeviceId) -> bool {
        self.bindings.lock().iter().any(|b| b.device == device)
    }

    /// Every started `(stream, device)` pair on the backend `id` aliases.
    ///
    /// Empty when `id` is unknown or nothing on its backend is started.
    pub fn shared_backend_bindings(&self, id: DeviceId) -> Vec<(Arc<Stream>, DeviceId)> {
        let ids = {
            let catalog = self.catalog.lock();
            match catalog.backend_of(id) {
                Some(backend) => catalog.ids_on_backend(backend),
                None => return Vec::new(),
            }
        };
        let bindings: Vec<Binding> = self
            .bindings
            .lock()
            .iter()
            .filter(|b| ids.contains(&b.device))
            .copied()
            .collect();
        let streams = self.streams.lock();
        bindings
            .into_iter()
            .filter_map(|b| {
                streams
                    .get(&b.stream)
                    .and_then(Weak::upgrade)
                    .map(|s| (s, b.device))
            })
            .collect()
    }

    /// Apply a switch: every disconnect, then every connect.
    ///
    /// Holds the device-switch lock for the whole submission, so no two
    /// switches interleave. A failing entry does not stop the rest; the
    /// first failure is returned and nothing is rolled back.
    pub fn stream_dev_switch(&self, disconnect: &[Disconnect], connect: &[Connect]) -> Result<()> {
        let _switch = self.switch_lock.lock();
        tracing::info!(
            disconnect = disconnect.len(),
            connect = connect.len(),
            "device switch"
        );
        let mut first_err = None;
        for entry in disconnect {
            if let Err(e) = entry.stream.disconnect_stream_device(entry.device) {
                tracing::error!(stream = %entry.stream.id(), device = %entry.device, error = %e, "disconnect failed");
                first_err.get_or_insert(e);
            }
        }
        for entry in connect {
            if let Err(e) = entry.stream.connect_stream_device(&entry.device) {
                tracing::error!(stream = %entry.stream.id(), device = %entry.device.id, error = %e, "connect failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_config::DeviceEntry;
    use ruta_core::{MediaConfig, StreamType};
    use ruta_hal::SimBackend;

    fn coordinator() -> Arc<ResourceCoordinator> {
        let sim = SimBackend::new();
        ResourceCoordinator::new(
            RutaConfig::default().with_backoff_ms(0),
            Arc::new(sim.clone()),
            Arc::new(sim),
        )
    }

    #[test]
    fn readiness_follows_catalog() {
        let rm = coordinator();
        assert!(rm.is_device_ready(DeviceId::OutSpeaker));
        assert!(!rm.is_device_ready(DeviceId::None));
        assert!(rm.set_device_ready(DeviceId::OutSpeaker, false));
        assert!(!rm.is_device_ready(DeviceId::OutSpeaker));
        assert!(!rm.set_device_ready(DeviceId::None, true));
    }

    #[test]
    fn pool_hands_out_one_handle_per_id() {
        let rm = coordinator();
        let attrs = DeviceAttributes::new(DeviceId::OutSpeaker);
        let a = rm.acquire_device(&attrs).unwrap();
        let b = rm.acquire_device(&attrs).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        drop(a);
        drop(b);
        assert!(rm.device(DeviceId::OutSpeaker).is_none());
    }

    #[test]
    fn none_cannot_be_acquired() {
        let rm = coordinator();
        assert!(rm.acquire_device(&DeviceAttributes::new(DeviceId::None)).is_err());
    }

    #[test]
    fn device_config_attaches_ec_and_follows_stream_for_usb() {
        let rm = coordinator();
        let stream = StreamAttributes::capture(StreamType::VoipTx, MediaConfig::pcm(16000, 24, 1));

        let mut mic = DeviceAttributes::new(DeviceId::InHandsetMic);
        rm.device_config(&mut mic, Some(&stream), 2).unwrap();
        assert_eq!(mic.config.sample_rate, 48000);
        assert_eq!(mic.config.ec_ref, Some(EcInfo { channels: 2 }));

        let mut usb = DeviceAttributes::new(DeviceId::InUsbHeadset);
        rm.device_config(&mut usb, Some(&stream), 0).unwrap();
        assert_eq!(usb.config.sample_rate, 16000);
        assert_eq!(usb.config.bit_width, 24);
        assert_eq!(usb.config.ec_ref, None);
    }

    #[test]
    fn device_config_unknown_device_is_no_device() {
        let sim = SimBackend::new();
        let rm = ResourceCoordinator::new(
            RutaConfig::with_catalog(DeviceCatalog::new(vec![DeviceEntry::new(
                DeviceId::OutSpeaker,
                "wsa",
            )])),
            Arc::new(sim.clone()),
            Arc::new(sim),
        );
        let mut hdmi = DeviceAttributes::new(DeviceId::OutHdmi);
        assert!(matches!(
            rm.device_config(&mut hdmi, None, 0),
            Err(Error::NoDevice(_))
        ));
    }

    #[test]
    fn binding_table_is_a_set() {
        let rm = coordinator();
        let dev = rm
            .acquire_device(&DeviceAttributes::new(DeviceId::OutSpeaker))
            .unwrap();
        let id = StreamId::next();
        rm.register_device(id, &dev);
        rm.register_device(id, &dev);
        assert_eq!(rm.active_bindings().len(), 1);
        assert!(rm.is_device_active(DeviceId::OutSpeaker));
        assert!(rm.deregister_device(id, DeviceId::OutSpeaker));
        assert!(!rm.deregister_device(id, DeviceId::OutSpeaker));
        assert!(!rm.is_device_active(DeviceId::OutSpeaker));
    }

    #[test]
    fn unsupported_direction_rejected() {
        let rm = coordinator();
        let attrs = StreamAttributes::playback(StreamType::DeepBuffer, MediaConfig::default());
        assert!(rm.is_stream_supported(&attrs, &[DeviceAttributes::new(DeviceId::OutSpeaker)]));
        assert!(!rm.is_stream_supported(&attrs, &[DeviceAttributes::new(DeviceId::InHandsetMic)]));
    }

    #[test]
    fn offline_fails_fast() {
        let rm = coordinator();
        rm.offline.store(true, Ordering::Release);
        assert_eq!(rm.fail_if_offline("open"), Err(Error::HardwareOffline));
    }
}
