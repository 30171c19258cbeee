//! Single-device connect and disconnect.
//!
//! Both operations bring one device to the stream's current lifecycle
//! level, so a device switch on a running stream leaves it running on the
//! new device.

use std::sync::Arc;

use ruta_core::{DeviceAttributes, DeviceId, Error, Result, StreamState};

use super::{BoundDevice, Stream};

impl Stream {
    /// Bind `attrs.id` and raise it to the stream's state.
    ///
    /// | state | work done |
    /// |---|---|
    /// | `Idle` | recorded only |
    /// | `Initialized`, `Stopped` | opened and wired into the session |
    /// | `Running`, `Paused` | opened, wired, started and connected |
    ///
    /// The device must face a direction the stream carries. Connecting a
    /// device that is already bound does nothing. Session wiring and device
    /// start run under the graph lock. A failure undoes this call's steps
    /// and leaves the device list unchanged.
    pub fn connect_stream_device(&self, attrs: &DeviceAttributes) -> Result<()> {
        if attrs.id.is_none() {
            return Err(Error::invalid("cannot connect the 'none' device"));
        }
        let mut inner = self.inner.lock();
        if !attrs
            .id
            .direction()
            .is_some_and(|dir| inner.attrs.direction.accepts(dir))
        {
            return Err(Error::invalid(format!(
                "{} cannot carry {} on a {:?} stream",
                self.id, attrs.id, inner.attrs.direction
            )));
        }
        if inner.position(attrs.id).is_some() {
            tracing::debug!(stream = %self.id, device = %attrs.id, "already connected");
            return Ok(());
        }

        let handle = self.coordinator.acquire_device(attrs)?;
        handle.set_attributes(attrs.clone())?;
        let bound = BoundDevice {
            handle: Arc::clone(&handle),
            attrs: attrs.clone(),
        };
        if inner.state == StreamState::Idle {
            inner.devices.push(bound);
            tracing::debug!(stream = %self.id, device = %attrs.id, "device recorded");
            return Ok(());
        }

        handle.open()?;
        {
            let _graph = self.coordinator.lock_graph();
            let setup = match inner.session.as_mut() {
                Some(session) => session.setup_device(attrs),
                None => Ok(()),
            };
            if let Err(e) = setup {
                tracing::error!(stream = %self.id, device = %attrs.id, error = %e, "device setup failed");
                close_quietly(&handle);
                return Err(e);
            }

            if inner.started {
                self.coordinator.register_device(self.id, &handle);
                if let Err(e) = handle.start() {
                    tracing::error!(stream = %self.id, device = %attrs.id, error = %e, "device start failed");
                    self.coordinator.deregister_device(self.id, attrs.id);
                    close_quietly(&handle);
                    return Err(e);
                }
                if let Some(session) = inner.session.as_mut()
                    && let Err(e) = session.connect_device(attrs.id)
                {
                    tracing::warn!(stream = %self.id, device = %attrs.id, error = %e, "session connect failed");
                }
            }
        }

        // Every bound device is open outside `Idle`.
        inner.devices.push(bound);
        inner.devices_opened = inner.devices.len();
        tracing::info!(stream = %self.id, device = %attrs.id, state = %inner.state, "device connected");
        Ok(())
    }

    /// Unbind `id`, undoing whatever the stream had done to it.
    ///
    /// Returns `Ok(false)` when `id` is not bound. Teardown failures are
    /// logged and the first is returned after the device is removed.
    pub fn disconnect_stream_device(&self, id: DeviceId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.position(id) else {
            tracing::debug!(stream = %self.id, device = %id, "not connected");
            return Ok(false);
        };
        let handle = Arc::clone(&inner.devices[index].handle);
        let opened = index < inner.devices_opened;
        let mut first_err = None;

        {
            let _graph = self.coordinator.lock_graph();
            if let Some(session) = inner.session.as_mut()
                && let Err(e) = session.disconnect_device(id)
            {
                tracing::warn!(stream = %self.id, device = %id, error = %e, "session disconnect failed");
            }
            if inner.started
                && let Err(e) = handle.stop()
            {
                tracing::error!(stream = %self.id, device = %id, error = %e, "device stop failed");
                first_err.get_or_insert(e);
            }
        }
        self.coordinator.deregister_device(self.id, id);
        if opened
            && let Err(e) = handle.close()
        {
            tracing::error!(stream = %self.id, device = %id, error = %e, "device close failed");
            first_err.get_or_insert(e);
        }

        inner.devices.remove(index);
        if opened {
            inner.devices_opened -= 1;
        }
        tracing::info!(stream = %self.id, device = %id, "device disconnected");
        first_err.map_or(Ok(true), Err)
    }
}

fn close_quietly(handle: &crate::Device) {
    if let Err(e) = handle.close() {
        tracing::warn!(device = %handle.id(), error = %e, "rollback close failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ruta_config::RutaConfig;
    use ruta_core::{DeviceAttributes, DeviceId, MediaConfig, StreamAttributes, StreamType};
    use ruta_hal::{SimBackend, Subject};

    use crate::{ResourceCoordinator, create_stream};

    #[test]
    fn connect_wires_session_under_graph_lock() {
        let sim = SimBackend::new();
        let rm = ResourceCoordinator::new(
            RutaConfig::default().with_backoff_ms(0),
            Arc::new(sim.clone()),
            Arc::new(sim.clone()),
        );
        let attrs = StreamAttributes::playback(StreamType::LowLatency, MediaConfig::default());
        let stream =
            create_stream(&rm, &attrs, &[DeviceAttributes::new(DeviceId::OutSpeaker)], &[])
                .unwrap();
        stream.open().unwrap();
        stream.start().unwrap();
        let session = Subject::Session {
            stream: stream.id(),
        };
        let headset = Subject::Device {
            id: DeviceId::OutWiredHeadset,
        };

        let graph = rm.lock_graph();
        let worker = {
            let stream = Arc::clone(&stream);
            std::thread::spawn(move || {
                stream.connect_stream_device(&DeviceAttributes::new(DeviceId::OutWiredHeadset))
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sim.journal().count(session, "setup(out_wired_headset)"), 0);
        assert_eq!(sim.journal().count(headset, "start"), 0);

        drop(graph);
        worker.join().unwrap().unwrap();
        assert_eq!(sim.journal().count(session, "setup(out_wired_headset)"), 1);
        assert_eq!(sim.journal().count(headset, "start"), 1);
        assert_eq!(
            stream.device_ids(),
            vec![DeviceId::OutSpeaker, DeviceId::OutWiredHeadset]
        );
    }
}
