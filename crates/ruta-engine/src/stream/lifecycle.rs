//! Lifecycle state machine, data transfer and session configuration.
//!
//! ```text
//! Idle ──open──▶ Initialized ──start──▶ Running ◀──resume── Paused
//!                                          └──────pause──────▶ │
//! Running / Paused ──stop──▶ Stopped ──start──▶ Running
//! any ──close──▶ Idle
//! ```
//!
//! Every lifecycle call checks the card state first: while the subsystem is
//! offline it sleeps the recovery backoff and fails with
//! [`Error::HardwareOffline`] without touching the stream. Data transfer
//! reports offline as [`Error::LinkReset`] and does not sleep. The
//! subsystem-restart handlers use the `*_locked` variants, which skip the
//! check.

use ruta_core::{
    ConfigKind, ConfigTag, DeviceId, DrainType, Error, Result, SessionTime, StreamAttributes,
    StreamDirection, StreamState, VolumeData,
};
use ruta_hal::Session;

use super::{BoundDevice, Stream, StreamInner, StreamKind};

fn session_of<'a>(
    inner: &'a mut StreamInner,
    op: &'static str,
) -> Result<&'a mut Box<dyn Session>> {
    let state = inner.state;
    inner
        .session
        .as_mut()
        .ok_or(Error::InvalidState { op, state })
}

impl Stream {
    /// Create and open the session, then open every bound device in order.
    ///
    /// A closed stream rebinds the devices it had when it was closed. If a
    /// device fails to open, the session is released and the stream stays
    /// `Idle`; devices opened before the failure stay open until `close` or
    /// a retried `open`, which resumes after them.
    pub fn open(&self) -> Result<()> {
        self.coordinator.fail_if_offline("open")?;
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Idle => self.open_locked(&mut inner),
            StreamState::Initialized => {
                tracing::debug!(stream = %self.id, "already open");
                Ok(())
            }
            state => Err(Error::InvalidState { op: "open", state }),
        }
    }

    pub(crate) fn open_locked(&self, inner: &mut StreamInner) -> Result<()> {
        if inner.devices.is_empty() {
            self.rebind_locked(inner)?;
        }
        if inner.devices.is_empty() {
            return Err(Error::NoDevice(format!("{} has no ready device", self.id)));
        }

        let mut session = self
            .coordinator
            .sessions()
            .create_session(self.id, &inner.attrs)?;
        session.register_event_sink(self.event_sink());
        session.open()?;

        if let Err(e) = self.open_devices(inner, session.as_mut()) {
            tracing::error!(
                stream = %self.id,
                opened = inner.devices_opened,
                error = %e,
                "device open failed"
            );
            if let Err(close_err) = session.close() {
                tracing::warn!(stream = %self.id, error = %close_err, "session close failed");
            }
            return Err(e);
        }

        inner.session = Some(session);
        inner.state = StreamState::Initialized;
        if let Some(this) = self.arc() {
            self.coordinator.register_stream(&this);
        }
        tracing::info!(
            stream = %self.id,
            kind = self.kind.name(),
            devices = inner.devices.len(),
            "stream opened"
        );
        Ok(())
    }

    fn open_devices(&self, inner: &mut StreamInner, session: &mut dyn Session) -> Result<()> {
        for index in 0..inner.devices.len() {
            let handle = std::sync::Arc::clone(&inner.devices[index].handle);
            let attrs = inner.devices[index].attrs.clone();
            if index >= inner.devices_opened {
                handle.set_attributes(attrs.clone())?;
                handle.open()?;
                inner.devices_opened = index + 1;
            }
            session.setup_device(&attrs)?;
        }
        Ok(())
    }

    /// Acquire handles for the remembered devices that are ready.
    pub(crate) fn rebind_locked(&self, inner: &mut StreamInner) -> Result<()> {
        for attrs in inner.remembered.clone() {
            if !self.coordinator.is_device_ready(attrs.id) {
                tracing::warn!(stream = %self.id, device = %attrs.id, "not ready, skipping rebind");
                continue;
            }
            let handle = self.coordinator.acquire_device(&attrs)?;
            inner.devices.push(BoundDevice { handle, attrs });
        }
        Ok(())
    }

    /// Start devices, then prepare and start the session.
    ///
    /// Runs under the graph lock. Devices are registered with the
    /// coordinator only after everything started; on failure the devices
    /// started by this call are stopped again. A stream that reached
    /// `Running` through [`Stream::write`] is started here too.
    pub fn start(&self) -> Result<()> {
        self.coordinator.fail_if_offline("start")?;
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Initialized | StreamState::Stopped => self.start_locked(&mut inner),
            // Running through `write` alone; devices were never started.
            StreamState::Running if !inner.started => self.start_locked(&mut inner),
            StreamState::Running => {
                tracing::debug!(stream = %self.id, "already running");
                Ok(())
            }
            state => Err(Error::InvalidState { op: "start", state }),
        }
    }

    fn start_locked(&self, inner: &mut StreamInner) -> Result<()> {
        {
            let _graph = self.coordinator.lock_graph();
            let mut started = 0;
            let mut result = Ok(());
            for bound in &inner.devices {
                if let Err(e) = bound.handle.start() {
                    tracing::error!(stream = %self.id, device = %bound.handle.id(), error = %e, "device start failed");
                    result = Err(e);
                    break;
                }
                started += 1;
            }
            if result.is_ok() {
                result = match inner.session.as_mut() {
                    Some(session) => session.prepare().and_then(|()| session.start()),
                    None => Err(Error::InvalidState {
                        op: "start",
                        state: inner.state,
                    }),
                };
            }
            if let Err(e) = result {
                for bound in &inner.devices[..started] {
                    if let Err(stop_err) = bound.handle.stop() {
                        tracing::warn!(device = %bound.handle.id(), error = %stop_err, "rollback stop failed");
                    }
                }
                return Err(e);
            }
        }

        for bound in &inner.devices {
            self.coordinator.register_device(self.id, &bound.handle);
        }
        inner.started = true;
        inner.paused = false;
        inner.state = StreamState::Running;
        tracing::info!(stream = %self.id, "stream started");
        Ok(())
    }

    /// Pause the session. Devices stay started.
    pub fn pause(&self) -> Result<()> {
        self.coordinator.fail_if_offline("pause")?;
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Running => {
                session_of(&mut inner, "pause")?.set_config(
                    ConfigKind::Module,
                    ConfigTag::Pause,
                    None,
                )?;
                inner.paused = true;
                inner.state = StreamState::Paused;
                tracing::debug!(stream = %self.id, "stream paused");
                Ok(())
            }
            StreamState::Paused => Ok(()),
            state => Err(Error::InvalidState { op: "pause", state }),
        }
    }

    /// Resume a paused session.
    pub fn resume(&self) -> Result<()> {
        self.coordinator.fail_if_offline("resume")?;
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Paused => {
                session_of(&mut inner, "resume")?.set_config(
                    ConfigKind::Module,
                    ConfigTag::Resume,
                    None,
                )?;
                inner.paused = false;
                inner.state = StreamState::Running;
                tracing::debug!(stream = %self.id, "stream resumed");
                Ok(())
            }
            StreamState::Running => Ok(()),
            state => Err(Error::InvalidState { op: "resume", state }),
        }
    }

    /// Stop the session, then stop and deregister every device.
    ///
    /// A second `stop` performs no device or session calls.
    pub fn stop(&self) -> Result<()> {
        self.coordinator.fail_if_offline("stop")?;
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Running | StreamState::Paused => self.stop_locked(&mut inner),
            StreamState::Stopped | StreamState::Idle => {
                tracing::debug!(stream = %self.id, state = %inner.state, "already stopped");
                Ok(())
            }
            state => Err(Error::InvalidState { op: "stop", state }),
        }
    }

    /// Stop failures are logged and the first is returned; the stream is
    /// `Stopped` either way.
    pub(crate) fn stop_locked(&self, inner: &mut StreamInner) -> Result<()> {
        let mut first_err = None;
        if let Some(session) = inner.session.as_mut() {
            let _graph = self.coordinator.lock_graph();
            if let Err(e) = session.stop() {
                tracing::error!(stream = %self.id, error = %e, "session stop failed");
                first_err.get_or_insert(e);
            }
        }
        for bound in &inner.devices {
            if inner.started
                && let Err(e) = bound.handle.stop()
            {
                tracing::error!(stream = %self.id, device = %bound.handle.id(), error = %e, "device stop failed");
                first_err.get_or_insert(e);
            }
            self.coordinator.deregister_device(self.id, bound.handle.id());
        }
        inner.started = false;
        inner.paused = false;
        inner.state = StreamState::Stopped;
        tracing::info!(stream = %self.id, "stream stopped");
        first_err.map_or(Ok(()), Err)
    }

    /// Stop if needed, close every device and the session, and return to `Idle`.
    ///
    /// The device list is emptied; the devices are remembered so a later
    /// `open` can rebind them. On an `Idle` stream this only releases
    /// devices left open by a failed `open`.
    pub fn close(&self) -> Result<()> {
        self.coordinator.fail_if_offline("close")?;
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Idle && inner.devices_opened == 0 {
            tracing::debug!(stream = %self.id, "already closed");
            return Ok(());
        }
        self.close_locked(&mut inner)
    }

    pub(crate) fn close_locked(&self, inner: &mut StreamInner) -> Result<()> {
        let mut first_err = None;
        if inner.state.devices_started()
            && let Err(e) = self.stop_locked(inner)
        {
            first_err.get_or_insert(e);
        }

        let opened = inner.devices_opened.min(inner.devices.len());
        for bound in &inner.devices[..opened] {
            if let Err(e) = bound.handle.close() {
                tracing::error!(stream = %self.id, device = %bound.handle.id(), error = %e, "device close failed");
                first_err.get_or_insert(e);
            }
        }

        if let Some(mut session) = inner.session.take() {
            let _graph = self.coordinator.lock_graph();
            if let Err(e) = session.close() {
                tracing::error!(stream = %self.id, error = %e, "session close failed");
                first_err.get_or_insert(e);
            }
        }

        if !inner.devices.is_empty() {
            inner.remembered = inner.devices.drain(..).map(|d| d.attrs).collect();
        }
        inner.devices_opened = 0;
        inner.volume = None;
        inner.started = false;
        inner.paused = false;
        inner.a2dp_muted = false;
        inner.state = StreamState::Idle;
        self.coordinator.deregister_stream(self.id);
        tracing::info!(stream = %self.id, "stream closed");
        first_err.map_or(Ok(()), Err)
    }

    /// Write playback data through the session.
    ///
    /// Legal while `Initialized` or `Running`. A successful write on a
    /// playback stream moves it to `Running`.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if !self.kind.can_write() {
            return Err(Error::Unsupported(format!(
                "write on a {} stream",
                self.kind.name()
            )));
        }
        if self.coordinator.is_offline() {
            return Err(Error::LinkReset);
        }
        let mut inner = self.inner.lock();
        if !matches!(
            inner.state,
            StreamState::Initialized | StreamState::Running
        ) {
            return Err(Error::InvalidState {
                op: "write",
                state: inner.state,
            });
        }
        let written = session_of(&mut inner, "write")?.write(buf);
        match written {
            Ok(n) => {
                if inner.attrs.direction != StreamDirection::Input {
                    inner.state = StreamState::Running;
                }
                Ok(n)
            }
            Err(_) if self.coordinator.is_offline() => Err(Error::LinkReset),
            Err(e) => Err(e),
        }
    }

    /// Read capture data through the session.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if !self.kind.can_read() {
            return Err(Error::Unsupported(format!(
                "read on a {} stream",
                self.kind.name()
            )));
        }
        if self.coordinator.is_offline() {
            return Err(Error::LinkReset);
        }
        let mut inner = self.inner.lock();
        if !matches!(
            inner.state,
            StreamState::Initialized | StreamState::Running
        ) {
            return Err(Error::InvalidState {
                op: "read",
                state: inner.state,
            });
        }
        match session_of(&mut inner, "read")?.read(buf) {
            Err(_) if self.coordinator.is_offline() => Err(Error::LinkReset),
            other => other,
        }
    }

    /// Store `volume` and apply it if the stream is running.
    ///
    /// An empty volume is rejected and nothing is stored.
    pub fn set_volume(&self, volume: VolumeData) -> Result<()> {
        if volume.is_empty() {
            return Err(Error::invalid("volume has no channel pairs"));
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.volume = Some(volume);
        if inner.state == StreamState::Running && !self.coordinator.is_offline() {
            let session = inner.session.as_mut().ok_or(Error::InvalidState {
                op: "set volume",
                state: inner.state,
            })?;
            session.set_config(
                ConfigKind::Calibration,
                ConfigTag::Volume,
                inner.volume.as_ref(),
            )?;
        }
        Ok(())
    }

    /// Mute or unmute the session output.
    pub fn set_mute(&self, mute: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        let tag = if mute { ConfigTag::Mute } else { ConfigTag::Unmute };
        session_of(&mut inner, "mute")?.set_config(ConfigKind::Module, tag, None)
    }

    /// Mute a compressed stream routed to A2DP while the sink is suspended.
    pub(crate) fn mute_for_a2dp_suspend(&self) -> Result<()> {
        if self.kind != StreamKind::Compressed {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        let on_a2dp = inner.devices.iter().any(|d| d.handle.id().is_a2dp());
        if !on_a2dp || !inner.state.devices_started() || inner.a2dp_muted {
            return Ok(());
        }
        session_of(&mut inner, "mute")?.set_config(ConfigKind::Module, ConfigTag::Mute, None)?;
        inner.a2dp_muted = true;
        tracing::info!(stream = %self.id, "muted while a2dp is suspended");
        Ok(())
    }

    /// Undo [`Stream::mute_for_a2dp_suspend`].
    pub(crate) fn clear_a2dp_mute(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.a2dp_muted {
            return Ok(());
        }
        inner.a2dp_muted = false;
        if inner.session.is_none() {
            return Ok(());
        }
        tracing::info!(stream = %self.id, "unmuting after leaving a2dp");
        session_of(&mut inner, "unmute")?.set_config(ConfigKind::Module, ConfigTag::Unmute, None)
    }

    /// Replace the stream attributes and push them to a live session.
    ///
    /// The new attributes must keep the stream's kind.
    pub fn set_stream_attributes(&self, attrs: StreamAttributes) -> Result<()> {
        if StreamKind::for_type(attrs.stream_type) != self.kind {
            return Err(Error::invalid(format!(
                "{:?} cannot be carried by a {} stream",
                attrs.stream_type,
                self.kind.name()
            )));
        }
        self.kind.check_attributes(&attrs)?;
        let mut inner = self.inner.lock();
        inner.attrs = attrs;
        if let Some(session) = inner.session.as_mut() {
            session.set_config(ConfigKind::Module, ConfigTag::Attributes, None)?;
        }
        Ok(())
    }

    /// Forward an opaque parameter payload to the session.
    pub fn set_parameters(&self, param_id: u32, payload: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        session_of(&mut inner, "set parameters")?.set_parameters(param_id, payload)
    }

    /// Enable or disable echo reference from `device`.
    pub fn set_ec_ref(&self, device: DeviceId, enable: bool) -> Result<()> {
        if device.is_none() {
            return Err(Error::invalid("echo reference needs a device"));
        }
        let mut inner = self.inner.lock();
        session_of(&mut inner, "set ec ref")?.set_ec_ref(device, enable)
    }

    /// Drain queued data.
    pub fn drain(&self, kind: DrainType) -> Result<()> {
        let mut inner = self.inner.lock();
        session_of(&mut inner, "drain")?.drain(kind)
    }

    /// Discard queued data. Only meaningful while paused; a no-op otherwise
    /// and once stopped.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.paused {
            tracing::debug!(stream = %self.id, "flush while not paused");
            return Ok(());
        }
        if inner.state == StreamState::Stopped {
            return Ok(());
        }
        session_of(&mut inner, "flush")?.flush()
    }

    /// Session clock.
    pub fn timestamp(&self) -> Result<SessionTime> {
        let mut inner = self.inner.lock();
        session_of(&mut inner, "get timestamp")?.timestamp()
    }

    /// Release all hardware because the subsystem went offline.
    ///
    /// Stops (if started) and closes the stream, ending `Idle` whatever the
    /// individual calls return. The prior state is cached for the up handler.
    pub fn ssr_down_handler(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Idle && inner.devices_opened == 0 {
            return Ok(());
        }
        inner.cached_state = Some(inner.state);
        tracing::warn!(stream = %self.id, state = %inner.state, "subsystem down, closing stream");
        let result = self.close_locked(&mut inner);
        inner.state = StreamState::Idle;
        result
    }

    /// Prepare for a fresh open after the subsystem came back.
    ///
    /// Remembered devices are rebound. PCM streams then reopen, and restart
    /// if they were started when the subsystem went down. Compressed and
    /// sound-trigger streams wait for their owner to open them again.
    pub fn ssr_up_handler(&self) -> Result<()> {
        let cached = {
            let mut inner = self.inner.lock();
            if inner.state != StreamState::Idle {
                return Ok(());
            }
            if inner.devices.is_empty() {
                self.rebind_locked(&mut inner)?;
            }
            inner.cached_state.take()
        };
        tracing::info!(stream = %self.id, ?cached, "subsystem up");
        if self.kind != StreamKind::Pcm {
            return Ok(());
        }
        match cached {
            Some(StreamState::Initialized | StreamState::Stopped) => self.open(),
            Some(StreamState::Running | StreamState::Paused) => {
                self.open()?;
                self.start()
            }
            _ => Ok(()),
        }
    }
}
