//! Per-channel volume configuration.

use serde::{Deserialize, Serialize};

/// Gain applied to the channels selected by a mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelVolume {
    /// Bit mask of the channels this gain applies to.
    pub channel_mask: u32,
    /// Linear gain.
    pub vol: f32,
}

/// Volume configuration of a stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeData {
    /// Channel/gain pairs.
    pub pairs: Vec<ChannelVolume>,
}

impl VolumeData {
    /// Same gain on every channel.
    pub fn uniform(vol: f32) -> Self {
        Self {
            pairs: vec![ChannelVolume {
                channel_mask: u32::MAX,
                vol,
            }],
        }
    }

    /// Number of channel/gain pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pairs are present.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
