//! Graph identity key/value pairs.
//!
//! A session graph is identified by a vector of key/value pairs. Stream-role
//! keys carry the stream type's value, device-role keys carry a bound
//! device's value; other keys (instance, calibration) are opaque here.

use serde::{Deserialize, Serialize};

/// Which part of a stream a key describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphRole {
    /// The stream itself.
    Stream,
    /// One of the stream's bound devices.
    Device,
}

/// Key of a graph identity pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKey {
    /// Playback stream key.
    StreamRx,
    /// Capture stream key.
    StreamTx,
    /// Playback device key.
    DeviceRx,
    /// Capture device key.
    DeviceTx,
    /// Stream instance key.
    Instance,
    /// Any other key.
    Other(u32),
}

impl GraphKey {
    /// Role of this key, if it identifies the stream or a device.
    pub const fn role(self) -> Option<GraphRole> {
        match self {
            GraphKey::StreamRx | GraphKey::StreamTx => Some(GraphRole::Stream),
            GraphKey::DeviceRx | GraphKey::DeviceTx => Some(GraphRole::Device),
            GraphKey::Instance | GraphKey::Other(_) => None,
        }
    }
}

/// One key/value pair of a graph identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    /// Key.
    pub key: GraphKey,
    /// Value.
    pub value: u32,
}

impl KeyValue {
    /// Create a pair.
    pub const fn new(key: GraphKey, value: u32) -> Self {
        Self { key, value }
    }
}
