//! Shared device handle.
//!
//! One [`Device`] exists per device id at a time; streams hold it through
//! `Arc` and the coordinator's pool holds a `Weak`. Open and start are
//! reference counted: the driver is opened by the first `open` and closed by
//! the last `close`, and likewise for start/stop. Every stream that opened
//! (started) the device must close (stop) it exactly once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use ruta_core::{DeviceAttributes, DeviceId, Error, Result};
use ruta_hal::{DeviceDriver, DriverFactory};

struct DeviceInner {
    attrs: DeviceAttributes,
    driver: Option<Box<dyn DeviceDriver>>,
    open_count: usize,
    start_count: usize,
}

/// Handle to one physical or virtual endpoint, shared by every stream routed to it.
pub struct Device {
    id: DeviceId,
    drivers: Arc<dyn DriverFactory>,
    inner: Mutex<DeviceInner>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("open_count", &inner.open_count)
            .field("start_count", &inner.start_count)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub(crate) fn new(attrs: DeviceAttributes, drivers: Arc<dyn DriverFactory>) -> Self {
        Self {
            id: attrs.id,
            drivers,
            inner: Mutex::new(DeviceInner {
                attrs,
                driver: None,
                open_count: 0,
                start_count: 0,
            }),
        }
    }

    /// Endpoint id.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Current attributes.
    pub fn attributes(&self) -> DeviceAttributes {
        self.inner.lock().attrs.clone()
    }

    /// Replace the attributes.
    ///
    /// The new configuration reaches the driver at its next first-open; a
    /// device that is already open keeps running with the old one. The id
    /// cannot change.
    pub fn set_attributes(&self, attrs: DeviceAttributes) -> Result<()> {
        if attrs.id != self.id {
            return Err(Error::invalid(format!(
                "cannot retarget device {} to {}",
                self.id, attrs.id
            )));
        }
        self.inner.lock().attrs = attrs;
        Ok(())
    }

    /// Number of outstanding opens.
    pub fn open_count(&self) -> usize {
        self.inner.lock().open_count
    }

    /// Number of outstanding starts.
    pub fn start_count(&self) -> usize {
        self.inner.lock().start_count
    }

    /// Whether at least one user has the device open.
    pub fn is_open(&self) -> bool {
        self.open_count() > 0
    }

    /// Open the device, creating and opening the driver for the first user.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.open_count == 0 {
            let mut driver = self.drivers.create_driver(&inner.attrs)?;
            driver.open(&inner.attrs.config)?;
            tracing::debug!(device = %self.id, "driver opened");
            inner.driver = Some(driver);
        }
        inner.open_count += 1;
        Ok(())
    }

    /// Start the device. The driver is started for the first user.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.open_count == 0 {
            return Err(Error::invalid(format!("device {} is not open", self.id)));
        }
        if inner.start_count == 0 {
            if let Some(driver) = inner.driver.as_mut() {
                driver.start()?;
            }
            tracing::debug!(device = %self.id, "driver started");
        }
        inner.start_count += 1;
        Ok(())
    }

    /// Stop the device. The driver is stopped when the last user stops.
    ///
    /// The count is released even if the driver fails to stop.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.start_count {
            0 => Ok(()),
            1 => {
                inner.start_count = 0;
                tracing::debug!(device = %self.id, "driver stopping");
                inner.driver.as_mut().map_or(Ok(()), |d| d.stop())
            }
            _ => {
                inner.start_count -= 1;
                Ok(())
            }
        }
    }

    /// Close the device. The driver is closed and dropped when the last user closes.
    ///
    /// Closing a device that is still started stops the driver first.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.open_count {
            0 => Ok(()),
            1 => {
                inner.open_count = 0;
                let mut result = Ok(());
                if let Some(mut driver) = inner.driver.take() {
                    if inner.start_count > 0 {
                        tracing::warn!(device = %self.id, "closing a started device");
                        inner.start_count = 0;
                        result = driver.stop();
                    }
                    let closed = driver.close();
                    result = result.and(closed);
                }
                tracing::debug!(device = %self.id, "driver closed");
                result
            }
            _ => {
                inner.open_count -= 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_hal::{FaultMode, SimBackend, Subject};

    fn speaker(sim: &SimBackend) -> Device {
        Device::new(
            DeviceAttributes::new(DeviceId::OutSpeaker),
            Arc::new(sim.clone()),
        )
    }

    const SPEAKER: Subject = Subject::Device {
        id: DeviceId::OutSpeaker,
    };

    #[test]
    fn driver_opened_once_for_two_users() {
        let sim = SimBackend::new();
        let dev = speaker(&sim);
        dev.open().unwrap();
        dev.open().unwrap();
        dev.start().unwrap();
        dev.start().unwrap();
        assert_eq!(dev.open_count(), 2);

        dev.stop().unwrap();
        dev.close().unwrap();
        let journal = sim.journal();
        assert_eq!(journal.ops_for(SPEAKER), vec!["open", "start"]);

        dev.stop().unwrap();
        dev.close().unwrap();
        assert_eq!(
            sim.journal().ops_for(SPEAKER),
            vec!["open", "start", "stop", "close"]
        );
        assert!(!dev.is_open());
    }

    #[test]
    fn failed_open_does_not_count() {
        let sim = SimBackend::new();
        sim.inject_fault(SPEAKER, "open", FaultMode::Once);
        let dev = speaker(&sim);
        assert!(dev.open().is_err());
        assert_eq!(dev.open_count(), 0);
        dev.open().unwrap();
        assert_eq!(dev.open_count(), 1);
    }

    #[test]
    fn start_requires_open() {
        let sim = SimBackend::new();
        let dev = speaker(&sim);
        assert!(matches!(dev.start(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn extra_stop_and_close_are_noops() {
        let sim = SimBackend::new();
        let dev = speaker(&sim);
        dev.stop().unwrap();
        dev.close().unwrap();
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn last_close_stops_a_started_driver() {
        let sim = SimBackend::new();
        let dev = speaker(&sim);
        dev.open().unwrap();
        dev.start().unwrap();
        dev.close().unwrap();
        assert_eq!(
            sim.journal().ops_for(SPEAKER),
            vec!["open", "start", "stop", "close"]
        );
        assert_eq!(dev.start_count(), 0);
    }

    #[test]
    fn attributes_cannot_change_id() {
        let sim = SimBackend::new();
        let dev = speaker(&sim);
        assert!(
            dev.set_attributes(DeviceAttributes::new(DeviceId::OutHdmi))
                .is_err()
        );
        let with_address = DeviceAttributes::new(DeviceId::OutSpeaker).with_address("card=0");
        dev.set_attributes(with_address.clone()).unwrap();
        assert_eq!(dev.attributes(), with_address);
    }
}
