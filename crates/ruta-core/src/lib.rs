//! Ruta Core - value types shared by every layer of the routing stack
//!
//! This crate holds the plain data that flows between streams, devices,
//! sessions and the resource coordinator. Nothing here owns hardware or
//! takes locks; everything is cloned by value.
//!
//! # Core Abstractions
//!
//! ## Devices
//!
//! - [`DeviceId`] - Closed set of endpoint identifiers (speaker, A2DP, USB, ...)
//! - [`DeviceDirection`] - Render or capture side of a device
//! - [`DeviceAttributes`] / [`DeviceConfig`] - Per-binding device configuration
//!
//! ## Streams
//!
//! - [`StreamType`] / [`StreamDirection`] - What a stream carries and where
//! - [`StreamAttributes`] / [`MediaConfig`] - Format negotiated at creation
//! - [`StreamState`] - Lifecycle states of the stream state machine
//! - [`StreamId`] - Process-unique stream identity
//!
//! ## Session Vocabulary
//!
//! - [`ConfigKind`] / [`ConfigTag`] - Tags pushed to a session graph
//! - [`StreamEvent`] / [`SessionTime`] / [`DrainType`]
//!
//! ## Graph Identity
//!
//! - [`GraphKey`] / [`KeyValue`] - Key/value pairs describing a graph
//!
//! ## Errors
//!
//! - [`Error`] / [`Result`] - Shared error taxonomy with status codes
//!
//! # Example
//!
//! ```rust
//! use ruta_core::{DeviceAttributes, DeviceDirection, DeviceId, StreamDirection};
//!
//! let speaker = DeviceAttributes::new(DeviceId::OutSpeaker);
//! assert_eq!(speaker.id.direction(), Some(DeviceDirection::Output));
//! assert!(StreamDirection::Output.accepts(DeviceDirection::Output));
//! ```

mod attributes;
mod buffer;
mod device;
mod error;
mod graph_key;
mod session;
mod state;
mod volume;

pub use attributes::{
    AudioFormat, DeviceAttributes, DeviceConfig, EcInfo, MediaConfig, Modifier, StreamAttributes,
    StreamDirection, StreamType,
};
pub use buffer::{BufferInfo, BufferRequest};
pub use device::{DeviceDirection, DeviceId};
pub use error::{Error, Result};
pub use graph_key::{GraphKey, GraphRole, KeyValue};
pub use session::{ConfigKind, ConfigTag, DrainType, SessionTime, StreamEvent};
pub use state::{StreamId, StreamState};
pub use volume::{ChannelVolume, VolumeData};
