//! Streams: lifecycle state machine, device bindings and routing.
//!
//! A [`Stream`] owns its attributes, state, bound devices and session behind
//! one lock. The submodules split its surface:
//!
//! - `lifecycle` - open/start/pause/resume/stop/close, data transfer,
//!   session configuration and subsystem-restart handlers
//! - `binding` - single-device connect and disconnect
//! - `routing` - multi-stream device switch planning and submission
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ruta_config::RutaConfig;
//! use ruta_core::{DeviceAttributes, DeviceId, MediaConfig, StreamAttributes, StreamState, StreamType};
//! use ruta_engine::{ResourceCoordinator, create_stream};
//! use ruta_hal::SimBackend;
//!
//! let sim = SimBackend::new();
//! let rm = ResourceCoordinator::new(RutaConfig::default(), Arc::new(sim.clone()), Arc::new(sim));
//! let attrs = StreamAttributes::playback(StreamType::DeepBuffer, MediaConfig::default());
//! let stream = create_stream(&rm, &attrs, &[DeviceAttributes::new(DeviceId::OutSpeaker)], &[]).unwrap();
//!
//! stream.open().unwrap();
//! stream.start().unwrap();
//! assert_eq!(stream.state(), StreamState::Running);
//! stream.close().unwrap();
//! assert!(stream.devices().is_empty());
//! ```

mod binding;
mod kind;
mod lifecycle;
mod routing;

pub use kind::StreamKind;
pub use routing::SwitchPlan;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use ruta_core::{
    AudioFormat, BufferInfo, BufferRequest, DeviceAttributes, DeviceId, Error, GraphRole, KeyValue,
    MediaConfig, Modifier, Result, StreamAttributes, StreamDirection, StreamEvent, StreamId,
    StreamState, StreamType, VolumeData,
};
use ruta_hal::{EventSink, Session};

use crate::{Device, ResourceCoordinator};

/// Callback receiving session events for a stream.
///
/// Any cookie the caller needs is captured by the closure.
pub type StreamCallback = Arc<dyn Fn(StreamId, &StreamEvent) + Send + Sync>;

/// A device bound to a stream, with the attributes the stream bound it with.
pub(crate) struct BoundDevice {
    pub(crate) handle: Arc<Device>,
    pub(crate) attrs: DeviceAttributes,
}

pub(crate) struct StreamInner {
    pub(crate) attrs: StreamAttributes,
    pub(crate) state: StreamState,
    /// State before the last subsystem-offline teardown.
    pub(crate) cached_state: Option<StreamState>,
    pub(crate) devices: Vec<BoundDevice>,
    /// Leading entries of `devices` this stream has opened.
    pub(crate) devices_opened: usize,
    /// Devices to rebind when a closed stream opens again.
    pub(crate) remembered: Vec<DeviceAttributes>,
    pub(crate) session: Option<Box<dyn Session>>,
    pub(crate) buffers: BufferInfo,
    pub(crate) volume: Option<VolumeData>,
    /// Whether this stream holds a start reference on every bound device.
    pub(crate) started: bool,
    pub(crate) paused: bool,
    pub(crate) a2dp_muted: bool,
}

impl StreamInner {
    pub(crate) fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.handle.id()).collect()
    }

    pub(crate) fn position(&self, id: DeviceId) -> Option<usize> {
        self.devices.iter().position(|d| d.handle.id() == id)
    }
}

/// A logical audio stream bound to zero or more shared devices.
pub struct Stream {
    id: StreamId,
    kind: StreamKind,
    this: Weak<Stream>,
    coordinator: Arc<ResourceCoordinator>,
    modifiers: Vec<Modifier>,
    callback: Arc<Mutex<Option<StreamCallback>>>,
    pub(crate) inner: Mutex<StreamInner>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Stream {
    pub(crate) fn new(
        coordinator: Arc<ResourceCoordinator>,
        attrs: StreamAttributes,
        devices: Vec<BoundDevice>,
        modifiers: &[Modifier],
    ) -> Arc<Self> {
        let kind = StreamKind::for_type(attrs.stream_type);
        let buffers = kind.default_buffers(&coordinator.buffer_defaults());
        let remembered = devices.iter().map(|d| d.attrs.clone()).collect();
        Arc::new_cyclic(|this| Self {
            id: StreamId::next(),
            kind,
            this: this.clone(),
            coordinator,
            modifiers: modifiers.to_vec(),
            callback: Arc::new(Mutex::new(None)),
            inner: Mutex::new(StreamInner {
                attrs,
                state: StreamState::Idle,
                cached_state: None,
                devices,
                devices_opened: 0,
                remembered,
                session: None,
                buffers,
                volume: None,
                started: false,
                paused: false,
                a2dp_muted: false,
            }),
        })
    }

    /// Process-unique id.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Behavior kind.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Coordinator this stream was created against.
    pub fn coordinator(&self) -> &Arc<ResourceCoordinator> {
        &self.coordinator
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.inner.lock().state
    }

    /// State the stream was in when the subsystem last went offline.
    pub fn cached_state(&self) -> Option<StreamState> {
        self.inner.lock().cached_state
    }

    /// Copy of the stream attributes.
    pub fn attributes(&self) -> StreamAttributes {
        self.inner.lock().attrs.clone()
    }

    /// Use case.
    pub fn stream_type(&self) -> StreamType {
        self.inner.lock().attrs.stream_type
    }

    /// Direction.
    pub fn direction(&self) -> StreamDirection {
        self.inner.lock().attrs.direction
    }

    /// Whether this stream can carry `format` on its playback side.
    pub fn is_output_format_supported(&self, format: AudioFormat) -> bool {
        format.is_output_supported()
    }

    /// Modifiers given at creation.
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Bound device handles, in binding order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner
            .lock()
            .devices
            .iter()
            .map(|d| Arc::clone(&d.handle))
            .collect()
    }

    /// Bound device ids, in binding order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.inner.lock().device_ids()
    }

    /// Whether a session is live.
    pub fn has_session(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// Run `f` against the live session, if any.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut dyn Session) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.session.as_mut().map(|s| f(s.as_mut()))
    }

    /// Stored volume.
    pub fn volume_data(&self) -> Option<VolumeData> {
        self.inner.lock().volume.clone()
    }

    /// Current buffer sizing.
    pub fn buf_info(&self) -> BufferInfo {
        self.inner.lock().buffers
    }

    /// Whether the stream is muted because its A2DP sink is suspended.
    pub fn is_a2dp_muted(&self) -> bool {
        self.inner.lock().a2dp_muted
    }

    /// Set buffer sizing for the directions the stream uses.
    ///
    /// Sizes are rounded down to a whole number of frames. A request is
    /// required for each direction the stream uses; requests for unused
    /// directions are ignored.
    pub fn set_buf_info(
        &self,
        input: Option<BufferRequest>,
        output: Option<BufferRequest>,
    ) -> Result<BufferInfo> {
        let mut inner = self.inner.lock();
        let direction = inner.attrs.direction;
        let mut buffers = inner.buffers;
        if matches!(direction, StreamDirection::Output | StreamDirection::Duplex) {
            let (size, count) = aligned(output, &inner.attrs.out_media, "output")?;
            buffers.out_size = size;
            buffers.out_count = count;
        }
        if matches!(direction, StreamDirection::Input | StreamDirection::Duplex) {
            let (size, count) = aligned(input, &inner.attrs.in_media, "input")?;
            buffers.in_size = size;
            buffers.in_count = count;
        }
        tracing::debug!(stream = %self.id, ?buffers, "buffer info set");
        inner.buffers = buffers;
        Ok(buffers)
    }

    /// Register the event callback, replacing any previous one.
    pub fn register_callback(&self, callback: StreamCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Remove the event callback.
    pub fn clear_callback(&self) {
        *self.callback.lock() = None;
    }

    /// Sink handed to sessions; forwards to whatever callback is registered
    /// when the event arrives.
    pub(crate) fn event_sink(&self) -> EventSink {
        let slot = Arc::clone(&self.callback);
        let id = self.id;
        Arc::new(move |event: StreamEvent| {
            let callback = slot.lock().clone();
            if let Some(callback) = callback {
                callback(id, &event);
            }
        })
    }

    /// Whether `keys` describe this stream's graph.
    ///
    /// Keys are checked in order and the last key with a role decides: a
    /// stream-role key matches the stream type's graph value, a device-role
    /// key matches if any bound device has that graph value. Keys without a
    /// role are ignored, so a set with no role keys matches nothing.
    pub fn is_graph_key_match(&self, keys: &[KeyValue]) -> bool {
        let inner = self.inner.lock();
        let mut matched = false;
        for kv in keys {
            match kv.key.role() {
                Some(GraphRole::Stream) => {
                    matched = kv.value == inner.attrs.stream_type.graph_value();
                }
                Some(GraphRole::Device) => {
                    matched = inner
                        .devices
                        .iter()
                        .any(|d| d.handle.id().graph_value() == kv.value);
                }
                None => {}
            }
        }
        matched
    }

    pub(crate) fn arc(&self) -> Option<Arc<Stream>> {
        self.this.upgrade()
    }
}

fn aligned(
    request: Option<BufferRequest>,
    media: &MediaConfig,
    side: &str,
) -> Result<(usize, usize)> {
    let request =
        request.ok_or_else(|| Error::invalid(format!("missing {side} buffer size")))?;
    let align = media.block_align();
    if align == 0 {
        return Err(Error::invalid(format!(
            "{side} format has zero block alignment"
        )));
    }
    if request.count == 0 {
        return Err(Error::invalid(format!("{side} buffer count is zero")));
    }
    Ok((request.size / align * align, request.count))
}
