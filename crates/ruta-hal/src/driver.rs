//! Device driver abstraction.

use ruta_core::{DeviceAttributes, DeviceConfig, Result};

/// I/O primitives of one physical or virtual endpoint.
///
/// Calls are blocking: they may talk to kernel drivers or firmware. The
/// engine guarantees open/close and start/stop are balanced and that a driver
/// is never started while closed.
pub trait DeviceDriver: Send {
    /// Open the endpoint with the given hardware configuration.
    fn open(&mut self, config: &DeviceConfig) -> Result<()>;

    /// Start the endpoint.
    fn start(&mut self) -> Result<()>;

    /// Stop the endpoint.
    fn stop(&mut self) -> Result<()>;

    /// Close the endpoint.
    fn close(&mut self) -> Result<()>;
}

/// Creates drivers for device ids.
pub trait DriverFactory: Send + Sync {
    /// Create a driver for the endpoint described by `attrs`.
    fn create_driver(&self, attrs: &DeviceAttributes) -> Result<Box<dyn DeviceDriver>>;
}
