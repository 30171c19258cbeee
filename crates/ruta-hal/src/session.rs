//! Session abstraction.

use std::sync::Arc;

use ruta_core::{
    ConfigKind, ConfigTag, DeviceAttributes, DeviceId, DrainType, Error, Result, SessionTime,
    StreamAttributes, StreamEvent, StreamId, VolumeData,
};

/// Receives asynchronous events raised by a session.
///
/// The engine installs a sink that forwards to the stream's registered
/// callback. Sinks may be called from any thread.
pub type EventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// The DSP-side graph of one stream.
///
/// A session is created when its stream opens and dropped when it closes.
/// Device wiring happens in two steps: [`Session::setup_device`] binds the
/// device into the graph, [`Session::connect_device`] enables the data path
/// once the device is running.
pub trait Session: Send {
    /// Allocate the graph.
    fn open(&mut self) -> Result<()>;

    /// Prepare the graph for start (buffers, calibration).
    fn prepare(&mut self) -> Result<()>;

    /// Start processing.
    fn start(&mut self) -> Result<()>;

    /// Stop processing.
    fn stop(&mut self) -> Result<()>;

    /// Release the graph.
    fn close(&mut self) -> Result<()>;

    /// Push a configuration tag. `volume` is set for [`ConfigTag::Volume`].
    fn set_config(
        &mut self,
        kind: ConfigKind,
        tag: ConfigTag,
        volume: Option<&VolumeData>,
    ) -> Result<()>;

    /// Push an opaque parameter payload.
    fn set_parameters(&mut self, param_id: u32, payload: &[u8]) -> Result<()>;

    /// Write playback data. Returns bytes consumed.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read capture data. Returns bytes produced.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Bind a device into the graph.
    fn setup_device(&mut self, device: &DeviceAttributes) -> Result<()>;

    /// Enable the data path to a bound, running device.
    fn connect_device(&mut self, device: DeviceId) -> Result<()>;

    /// Remove a device from the graph.
    fn disconnect_device(&mut self, device: DeviceId) -> Result<()>;

    /// Enable or disable echo reference from `device`.
    fn set_ec_ref(&mut self, device: DeviceId, enable: bool) -> Result<()> {
        let _ = (device, enable);
        Err(Error::Unsupported("echo reference".into()))
    }

    /// Current session clock.
    fn timestamp(&mut self) -> Result<SessionTime> {
        Err(Error::Unsupported("timestamp".into()))
    }

    /// Drain queued data.
    fn drain(&mut self, kind: DrainType) -> Result<()> {
        let _ = kind;
        Ok(())
    }

    /// Discard queued data.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Install the event sink.
    fn register_event_sink(&mut self, sink: EventSink);
}

/// Creates sessions for streams.
pub trait SessionFactory: Send + Sync {
    /// Create a session for stream `stream` with attributes `attrs`.
    fn create_session(&self, stream: StreamId, attrs: &StreamAttributes)
    -> Result<Box<dyn Session>>;
}
