//! Error types for seqring.

use std::io;

/// Result type for ring buffer operations.
pub type Result<T> = std::result::Result<T, RingError>;

/// Everything the ring can report to a caller.
///
/// All errors surface synchronously; the ring never retries on the caller's
/// behalf.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// Invalid construction parameters or misuse of the topology.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A claim asked for more slots than the ring holds.
    #[error("claim of {requested} slots exceeds ring capacity {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    /// A slot view was requested for a sequence the caller does not own.
    #[error("sequence {sequence} is out of range: {reason}")]
    OutOfRange { sequence: i64, reason: &'static str },

    /// A blocked claim or wait was terminated by shutdown.
    #[error("ring buffer has been shut down")]
    Cancelled,

    /// A bounded wait expired before the target sequence became available.
    #[error("timed out waiting for sequence {sequence}")]
    Timeout { sequence: i64 },

    /// Mapped-file backing failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// `close()` was called while other handles still reference the ring.
    #[error("ring buffer still referenced by {0} other handle(s)")]
    InUse(usize),
}

impl RingError {
    pub fn config(msg: impl Into<String>) -> Self {
        RingError::Configuration(msg.into())
    }

    pub(crate) fn out_of_range(sequence: i64, reason: &'static str) -> Self {
        RingError::OutOfRange { sequence, reason }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RingError::Timeout { .. } | RingError::InUse(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RingError::Cancelled)
    }
}
