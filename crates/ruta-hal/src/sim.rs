//! Deterministic in-memory backend.
//!
//! [`SimBackend`] implements both [`DriverFactory`] and [`SessionFactory`].
//! Every driver and session it creates appends a [`Call`] to a shared journal
//! before doing anything else, so tests can assert on the exact sequence of
//! hardware operations a routing decision produced. Individual calls can be
//! made to fail with [`SimBackend::inject_fault`].
//!
//! # Example
//!
//! ```rust
//! use ruta_core::{DeviceAttributes, DeviceConfig, DeviceId};
//! use ruta_hal::{DriverFactory, FaultMode, SimBackend, Subject};
//!
//! let sim = SimBackend::new();
//! let speaker = Subject::Device { id: DeviceId::OutSpeaker };
//! sim.inject_fault(speaker, "start", FaultMode::Once);
//!
//! let mut driver = sim
//!     .create_driver(&DeviceAttributes::new(DeviceId::OutSpeaker))
//!     .unwrap();
//! driver.open(&DeviceConfig::default()).unwrap();
//! assert!(driver.start().is_err());
//! assert!(driver.start().is_ok());
//! assert_eq!(sim.journal().count(speaker, "start"), 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use ruta_core::{
    ConfigKind, ConfigTag, DeviceAttributes, DeviceConfig, DeviceId, DrainType, Error,
    MediaConfig, Result, SessionTime, StreamAttributes, StreamEvent, StreamId, VolumeData,
};

use crate::{DeviceDriver, DriverFactory, EventSink, Session, SessionFactory};

/// Who a journaled call was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// A device driver.
    Device {
        /// Endpoint the driver serves.
        id: DeviceId,
    },
    /// A stream's session.
    Session {
        /// Owning stream.
        stream: StreamId,
    },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Device { id } => write!(f, "device {id}"),
            Subject::Session { stream } => write!(f, "session {stream}"),
        }
    }
}

/// One recorded driver or session call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    /// Target of the call.
    pub subject: Subject,
    /// Operation, e.g. `open`, `set_config(pause)`, `setup(out_speaker)`.
    pub op: String,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.op)
    }
}

/// How long an injected fault stays armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Fail the next matching call only.
    Once,
    /// Fail every matching call until faults are cleared.
    Always,
}

#[derive(Debug, Clone)]
struct Fault {
    subject: Subject,
    op: String,
    mode: FaultMode,
}

impl Fault {
    /// A fault on `open` matches `open`; a fault on `setup` matches every
    /// `setup(..)` call.
    fn matches(&self, subject: Subject, op: &str) -> bool {
        self.subject == subject && (self.op == op || op.split('(').next() == Some(&self.op))
    }
}

/// Snapshot of the calls recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Journal {
    calls: Vec<Call>,
}

impl Journal {
    /// All calls in order.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// How many times `op` was called on `subject`.
    pub fn count(&self, subject: Subject, op: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.subject == subject && c.op == op)
            .count()
    }

    /// Operations made on `subject`, in order.
    pub fn ops_for(&self, subject: Subject) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.subject == subject)
            .map(|c| c.op.as_str())
            .collect()
    }

    /// Position of the first `op` on `subject`.
    pub fn position(&self, subject: Subject, op: &str) -> Option<usize> {
        self.calls
            .iter()
            .position(|c| c.subject == subject && c.op == op)
    }
}

#[derive(Default)]
struct SimState {
    calls: Vec<Call>,
    faults: Vec<Fault>,
    sinks: HashMap<StreamId, EventSink>,
}

/// In-memory driver and session backend.
///
/// Cloning is cheap; clones share the journal, faults and event sinks.
#[derive(Clone, Default)]
pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
}

impl fmt::Debug for SimBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimBackend")
            .field("calls", &state.calls.len())
            .field("faults", &state.faults.len())
            .finish_non_exhaustive()
    }
}

impl SimBackend {
    /// Create a backend with an empty journal and no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the journal.
    pub fn journal(&self) -> Journal {
        Journal {
            calls: self.state.lock().calls.clone(),
        }
    }

    /// Forget every recorded call.
    pub fn clear_journal(&self) {
        self.state.lock().calls.clear();
    }

    /// Make `op` on `subject` fail.
    pub fn inject_fault(&self, subject: Subject, op: impl Into<String>, mode: FaultMode) {
        self.state.lock().faults.push(Fault {
            subject,
            op: op.into(),
            mode,
        });
    }

    /// Disarm every injected fault.
    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Deliver `event` to the sink registered by `stream`'s session.
    ///
    /// Returns `false` when no live session of that stream registered a sink.
    pub fn emit(&self, stream: StreamId, event: StreamEvent) -> bool {
        let sink = self.state.lock().sinks.get(&stream).cloned();
        match sink {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        }
    }

    fn record(&self, subject: Subject, op: String) -> Result<()> {
        let mut state = self.state.lock();
        let fault = state
            .faults
            .iter()
            .position(|f| f.matches(subject, &op));
        let failed = match fault {
            Some(index) => {
                if state.faults[index].mode == FaultMode::Once {
                    state.faults.remove(index);
                }
                true
            }
            None => false,
        };
        tracing::trace!(%subject, op = %op, failed, "sim call");
        let context = format!("{subject} {op}");
        state.calls.push(Call { subject, op });
        if failed {
            Err(Error::io(context, "injected fault"))
        } else {
            Ok(())
        }
    }
}

impl DriverFactory for SimBackend {
    fn create_driver(&self, attrs: &DeviceAttributes) -> Result<Box<dyn DeviceDriver>> {
        Ok(Box::new(SimDriver {
            id: attrs.id,
            sim: self.clone(),
        }))
    }
}

impl SessionFactory for SimBackend {
    fn create_session(
        &self,
        stream: StreamId,
        attrs: &StreamAttributes,
    ) -> Result<Box<dyn Session>> {
        Ok(Box::new(SimSession {
            stream,
            media: attrs.out_media,
            bytes_written: 0,
            sim: self.clone(),
        }))
    }
}

struct SimDriver {
    id: DeviceId,
    sim: SimBackend,
}

impl SimDriver {
    fn record(&self, op: &str) -> Result<()> {
        self.sim
            .record(Subject::Device { id: self.id }, op.to_string())
    }
}

impl DeviceDriver for SimDriver {
    fn open(&mut self, _config: &DeviceConfig) -> Result<()> {
        self.record("open")
    }

    fn start(&mut self) -> Result<()> {
        self.record("start")
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop")
    }

    fn close(&mut self) -> Result<()> {
        self.record("close")
    }
}

struct SimSession {
    stream: StreamId,
    media: MediaConfig,
    bytes_written: u64,
    sim: SimBackend,
}

impl SimSession {
    fn record(&self, op: impl Into<String>) -> Result<()> {
        self.sim.record(
            Subject::Session {
                stream: self.stream,
            },
            op.into(),
        )
    }
}

impl Session for SimSession {
    fn open(&mut self) -> Result<()> {
        self.record("open")
    }

    fn prepare(&mut self) -> Result<()> {
        self.record("prepare")
    }

    fn start(&mut self) -> Result<()> {
        self.record("start")
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop")
    }

    fn close(&mut self) -> Result<()> {
        self.record("close")
    }

    fn set_config(
        &mut self,
        kind: ConfigKind,
        tag: ConfigTag,
        volume: Option<&VolumeData>,
    ) -> Result<()> {
        if tag == ConfigTag::Volume && volume.is_none_or(VolumeData::is_empty) {
            return Err(Error::invalid("volume tag without volume data"));
        }
        let kind = match kind {
            ConfigKind::Module => "module",
            ConfigKind::Calibration => "calibration",
        };
        self.record(format!("set_config({kind},{})", tag.name()))
    }

    fn set_parameters(&mut self, param_id: u32, payload: &[u8]) -> Result<()> {
        self.record(format!("set_parameters({param_id:#x},{})", payload.len()))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.record("write")?;
        self.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.record("read")?;
        buf.fill(0);
        Ok(buf.len())
    }

    fn setup_device(&mut self, device: &DeviceAttributes) -> Result<()> {
        self.record(format!("setup({})", device.id))
    }

    fn connect_device(&mut self, device: DeviceId) -> Result<()> {
        self.record(format!("connect({device})"))
    }

    fn disconnect_device(&mut self, device: DeviceId) -> Result<()> {
        self.record(format!("disconnect({device})"))
    }

    fn set_ec_ref(&mut self, device: DeviceId, enable: bool) -> Result<()> {
        let state = if enable { "on" } else { "off" };
        self.record(format!("ec_ref({device},{state})"))
    }

    fn timestamp(&mut self) -> Result<SessionTime> {
        self.record("timestamp")?;
        let frame = self.media.block_align().max(1) as u64;
        let rate = u64::from(self.media.sample_rate.max(1));
        let frames = self.bytes_written / frame;
        Ok(SessionTime {
            session_time_us: frames * 1_000_000 / rate,
            absolute_time_us: 0,
        })
    }

    fn drain(&mut self, kind: DrainType) -> Result<()> {
        self.record(format!("drain({})", kind.name()))
    }

    fn flush(&mut self) -> Result<()> {
        self.record("flush")
    }

    fn register_event_sink(&mut self, sink: EventSink) {
        self.sim.state.lock().sinks.insert(self.stream, sink);
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        self.sim.state.lock().sinks.remove(&self.stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_core::StreamType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(sim: &SimBackend) -> (StreamId, Box<dyn Session>) {
        let id = StreamId::next();
        let attrs = StreamAttributes::playback(StreamType::DeepBuffer, MediaConfig::default());
        (id, sim.create_session(id, &attrs).unwrap())
    }

    #[test]
    fn journal_records_in_order() {
        let sim = SimBackend::new();
        let mut driver = sim
            .create_driver(&DeviceAttributes::new(DeviceId::OutSpeaker))
            .unwrap();
        driver.open(&DeviceConfig::default()).unwrap();
        driver.start().unwrap();
        driver.stop().unwrap();
        driver.close().unwrap();

        let speaker = Subject::Device {
            id: DeviceId::OutSpeaker,
        };
        assert_eq!(
            sim.journal().ops_for(speaker),
            vec!["open", "start", "stop", "close"]
        );
    }

    #[test]
    fn once_fault_fires_once() {
        let sim = SimBackend::new();
        let (id, mut session) = session(&sim);
        sim.inject_fault(Subject::Session { stream: id }, "prepare", FaultMode::Once);

        let err = session.prepare().unwrap_err();
        assert!(err.to_string().contains("injected fault"), "got: {err}");
        assert!(session.prepare().is_ok());
    }

    #[test]
    fn always_fault_matches_wiring_prefix() {
        let sim = SimBackend::new();
        let (id, mut session) = session(&sim);
        sim.inject_fault(Subject::Session { stream: id }, "setup", FaultMode::Always);

        for dev in [DeviceId::OutSpeaker, DeviceId::OutHdmi] {
            assert!(session.setup_device(&DeviceAttributes::new(dev)).is_err());
        }
        sim.clear_faults();
        assert!(
            session
                .setup_device(&DeviceAttributes::new(DeviceId::OutSpeaker))
                .is_ok()
        );
    }

    #[test]
    fn emit_reaches_registered_sink_until_drop() {
        let sim = SimBackend::new();
        let (id, mut session) = session(&sim);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        session.register_event_sink(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(sim.emit(id, StreamEvent::WriteReady));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(session);
        assert!(!sim.emit(id, StreamEvent::WriteReady));
    }

    #[test]
    fn timestamp_tracks_written_frames() {
        let sim = SimBackend::new();
        let (_, mut session) = session(&sim);
        // 48 kHz stereo 16-bit: 4 bytes per frame, 48 frames per ms.
        session.write(&[0u8; 4 * 480]).unwrap();
        let ts = session.timestamp().unwrap();
        assert_eq!(ts.session_time_us, 10_000);
    }

    #[test]
    fn volume_tag_requires_data() {
        let sim = SimBackend::new();
        let (_, mut session) = session(&sim);
        assert!(
            session
                .set_config(ConfigKind::Calibration, ConfigTag::Volume, None)
                .is_err()
        );
        let vol = VolumeData::uniform(0.5);
        session
            .set_config(ConfigKind::Calibration, ConfigTag::Volume, Some(&vol))
            .unwrap();
    }
}
