//! Error taxonomy for stream and routing operations.
//!
//! Every fallible operation in the workspace returns [`Result`]. Callers that
//! need the numeric status convention of the platform audio HAL (zero for
//! success, negative errno otherwise) use [`Error::code`].

use thiserror::Error;

use crate::StreamState;

const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const ENOSYS: i32 = 38;
const ENETRESET: i32 = 102;

/// Errors surfaced by devices, sessions, streams and the resource coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed input: empty device list, zero count, bad attributes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Lifecycle call made from a state that does not permit it.
    #[error("cannot {op} a stream in state {state}")]
    InvalidState {
        /// Name of the rejected operation.
        op: &'static str,
        /// State the stream was in when the call arrived.
        state: StreamState,
    },

    /// Allocation of stream-owned storage failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// No requested device is ready.
    #[error("no device available: {0}")]
    NoDevice(String),

    /// Operation or configuration not supported by this stream kind or platform.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The audio subsystem is offline (subsystem restart in progress).
    #[error("audio subsystem offline")]
    HardwareOffline,

    /// The subsystem went offline underneath a read or write.
    #[error("link reset: audio subsystem offline during data transfer")]
    LinkReset,

    /// A driver or session call failed.
    #[error("{context}: {reason}")]
    Io {
        /// What was being attempted (e.g. "device speaker start").
        context: String,
        /// Failure reported by the collaborator.
        reason: String,
    },
}

impl Error {
    /// Create an invalid-argument error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidArgument(reason.into())
    }

    /// Create an I/O error for a failed collaborator call.
    pub fn io(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Io {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Negative errno-style status code for this error.
    ///
    /// Illegal state transitions share the invalid-argument code; hardware
    /// offline on a lifecycle call reports as a generic I/O failure while
    /// offline during a transfer reports as a link reset.
    pub const fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::InvalidState { .. } => -EINVAL,
            Error::OutOfMemory(_) => -ENOMEM,
            Error::NoDevice(_) => -ENODEV,
            Error::Unsupported(_) => -ENOSYS,
            Error::HardwareOffline | Error::Io { .. } => -EIO,
            Error::LinkReset => -ENETRESET,
        }
    }

    /// Whether this error means the caller should wait for subsystem recovery.
    pub const fn is_offline(&self) -> bool {
        matches!(self, Error::HardwareOffline | Error::LinkReset)
    }
}

/// Convenience result type for ruta operations.
pub type Result<T> = std::result::Result<T, Error>;
