//! Vocabulary shared between streams and session implementations.

use serde::{Deserialize, Serialize};

/// Which configuration space a tag is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// Module-level control (pause, mute).
    Module,
    /// Calibration data (volume).
    Calibration,
}

/// Tag pushed to a session graph through `set_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigTag {
    /// Re-apply stream attributes without a specific tag.
    Attributes,
    /// Pause rendering.
    Pause,
    /// Resume rendering.
    Resume,
    /// Mute output.
    Mute,
    /// Unmute output.
    Unmute,
    /// Apply the stream's volume data.
    Volume,
}

impl ConfigTag {
    /// Snake-case name of the tag.
    pub const fn name(self) -> &'static str {
        match self {
            ConfigTag::Attributes => "attributes",
            ConfigTag::Pause => "pause",
            ConfigTag::Resume => "resume",
            ConfigTag::Mute => "mute",
            ConfigTag::Unmute => "unmute",
            ConfigTag::Volume => "volume",
        }
    }
}

/// How much of a compressed stream to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainType {
    /// Drain everything written so far.
    Full,
    /// Drain up to the current track boundary (gapless).
    Partial,
}

impl DrainType {
    /// Snake-case name of the drain type.
    pub const fn name(self) -> &'static str {
        match self {
            DrainType::Full => "full",
            DrainType::Partial => "partial",
        }
    }
}

/// Session clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionTime {
    /// Media time rendered by the session, in microseconds.
    pub session_time_us: u64,
    /// Wall-clock time of the reading, in microseconds.
    pub absolute_time_us: u64,
}

/// Asynchronous event raised by a session and forwarded to the stream callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    /// Space is available for another write.
    WriteReady,
    /// A full drain completed.
    DrainReady,
    /// A partial drain completed.
    PartialDrainReady,
    /// A voice trigger fired.
    Detection {
        /// Detection payload.
        payload: Vec<u8>,
    },
    /// The session hit an unrecoverable error.
    Error {
        /// Description from the session.
        reason: String,
    },
}
