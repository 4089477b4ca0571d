//! Error types surfaced by the binding layer.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Broad class of an [`Error`], matching the exception a scripting host raises for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call needs an initialization state that does not hold.
    Config,
    /// The caller passed the wrong number, type or shape of arguments.
    Argument,
    /// A buffer could not be allocated.
    Resource,
}

/// The main error type for the binding layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A driver-dependent operation was invoked before `init()`.
    #[error("Lora not initialized")]
    NotInitialized,
    /// `set_pins()` was invoked after the bus had been opened.
    #[error("set_pins() has no effect after initialization")]
    PinsLocked,
    /// An argument did not have the shape the operation expects.
    #[error("{method}(): {reason}")]
    Argument {
        /// Exported name of the operation.
        method: &'static str,
        /// What was wrong with the arguments.
        reason: String,
    },
    /// The method table has no entry with this name.
    #[error("module has no method '{0}'")]
    UnknownMethod(String),
    /// The scratch buffer for packet retrieval could not be allocated.
    #[error("out of memory allocating the receive buffer")]
    OutOfMemory,
}

impl Error {
    pub(crate) fn argument(method: &'static str, reason: impl Into<String>) -> Self {
        Error::Argument {
            method,
            reason: reason.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotInitialized | Error::PinsLocked => ErrorKind::Config,
            Error::Argument { .. } | Error::UnknownMethod(_) => ErrorKind::Argument,
            Error::OutOfMemory => ErrorKind::Resource,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}
