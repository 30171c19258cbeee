//! Stream identity and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a stream.
///
/// Ids are allocated monotonically and never reused, so they order streams
/// by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    /// Allocate the next stream id.
    pub fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Lifecycle state of a stream.
///
/// ```text
/// Idle ──open──▶ Initialized ──start──▶ Running ◀──resume── Paused
///  ▲                 │                    │  └──pause──────▶  │
///  │                 │                    ▼                   │
///  └────close────────┴──────────────── Stopped ◀───stop──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// No session; initial and terminal state.
    #[default]
    Idle,
    /// Session and devices opened, not yet started.
    Initialized,
    /// Devices and session started; data is flowing.
    Running,
    /// Session paused; devices remain started.
    Paused,
    /// Session and devices stopped; may be restarted or closed.
    Stopped,
}

impl StreamState {
    /// Lowercase name of the state.
    pub const fn name(self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Initialized => "initialized",
            StreamState::Running => "running",
            StreamState::Paused => "paused",
            StreamState::Stopped => "stopped",
        }
    }

    /// Whether a session must exist in this state.
    pub const fn has_session(self) -> bool {
        !matches!(self, StreamState::Idle)
    }

    /// Whether bound devices are started in this state.
    pub const fn devices_started(self) -> bool {
        matches!(self, StreamState::Running | StreamState::Paused)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
