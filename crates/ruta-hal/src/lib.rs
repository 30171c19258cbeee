//! Ruta HAL - collaborator traits between the routing engine and hardware
//!
//! The engine never talks to hardware directly. It drives two kinds of
//! collaborator through object-safe traits:
//!
//! - [`DeviceDriver`] / [`DriverFactory`] - I/O primitives of one endpoint
//!   (open, start, stop, close).
//! - [`Session`] / [`SessionFactory`] - the DSP-side graph of one stream
//!   (prepare, start, configure, data transfer, device wiring).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           ruta-engine            │
//! │  Stream / Device / Coordinator   │
//! └──────────────┬───────────────────┘
//!                │ Box<dyn DeviceDriver>, Box<dyn Session>
//!                ▼
//! ┌──────────────────────────────────┐
//! │   DriverFactory + SessionFactory │
//! └──────────────┬───────────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ SimBackend  │  │ platform    │
//! │ (journal,   │  │ drivers     │
//! │  faults)    │  │             │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! Factories hand out boxed trait objects so the backend can be chosen at
//! runtime. The [`sim`] backend records every call in a shared journal and
//! can be told to fail specific calls, which is how the engine's tests and
//! the `ruta simulate` command exercise failure paths.

mod driver;
mod session;
pub mod sim;

pub use driver::{DeviceDriver, DriverFactory};
pub use session::{EventSink, Session, SessionFactory};
pub use sim::{Call, FaultMode, Journal, SimBackend, Subject};
