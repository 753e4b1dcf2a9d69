//! Failure types delivered through completion handlers

use std::io;
use std::time::Duration;

/// Result type handed to completion handlers
pub type OpResult<T> = Result<T, OperationFailure>;

/// Failure forwarded to a fail-fast join's final handler.
///
/// This is the first [`OperationFailure`] observed among the fanned-out
/// operations, passed through verbatim.
pub type JoinFailure = OperationFailure;

/// Failure reported by an individual asynchronous operation.
///
/// Never raised on the loop thread; always delivered as the error side of an
/// [`OpResult`] to the handler registered for the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationFailure {
    /// Blocking I/O failed
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        /// Kind of the underlying `std::io::Error`
        kind: io::ErrorKind,
        /// Rendered error message
        message: String,
    },

    /// The blocking operation panicked on a worker thread
    #[error("operation panicked: {0}")]
    Panicked(String),

    /// A timeout wrapper fired before the operation completed
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The worker pool was shut down before the operation could run
    #[error("worker pool is shut down")]
    PoolClosed,

    /// The caller or the operation broke the completion contract
    #[error("misuse: {0}")]
    Misuse(String),

    /// Any other failure reported by an operation
    #[error("{0}")]
    Other(String),
}

impl OperationFailure {
    /// Build an `Other` failure from anything displayable.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        OperationFailure::Other(message.to_string())
    }

    /// Whether this failure came from a timeout wrapper.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OperationFailure::TimedOut(_))
    }
}

impl From<io::Error> for OperationFailure {
    fn from(err: io::Error) -> Self {
        OperationFailure::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<String> for OperationFailure {
    fn from(s: String) -> Self {
        OperationFailure::Other(s)
    }
}

impl From<&str> for OperationFailure {
    fn from(s: &str) -> Self {
        OperationFailure::Other(s.to_string())
    }
}

/// Errors raised by the scheduler itself (not by operations)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// `run()` was called from inside a handler
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// Configuration could not be parsed or applied
    #[error("invalid configuration: {0}")]
    Config(String),
}
