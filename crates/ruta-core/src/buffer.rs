//! Buffer sizing for stream data transfer.

use serde::{Deserialize, Serialize};

/// Requested size and count of transfer buffers for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRequest {
    /// Size of one buffer in bytes.
    pub size: usize,
    /// Number of buffers.
    pub count: usize,
}

impl BufferRequest {
    /// Create a request.
    pub const fn new(size: usize, count: usize) -> Self {
        Self { size, count }
    }
}

/// Buffer sizes and counts currently configured on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BufferInfo {
    /// Capture buffer size in bytes.
    pub in_size: usize,
    /// Capture buffer count.
    pub in_count: usize,
    /// Playback buffer size in bytes.
    pub out_size: usize,
    /// Playback buffer count.
    pub out_count: usize,
}

impl BufferInfo {
    /// Same size and count in both directions.
    pub const fn symmetric(size: usize, count: usize) -> Self {
        Self {
            in_size: size,
            in_count: count,
            out_size: size,
            out_count: count,
        }
    }
}
