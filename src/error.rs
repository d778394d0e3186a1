//! Error types for the rate limiter

use thiserror::Error;

/// Errors produced by the rate limiter itself.
///
/// Transport errors (from the base dialer or the underlying connection) are
/// never wrapped in this type; they pass through as plain [`std::io::Error`]
/// so the wrapped transport's failure semantics stay intact.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured refill rate is not a positive finite number.
    #[error("refill rate must be a positive number of bytes per second, got {0}")]
    InvalidRate(f64),

    /// The write deadline expired before enough byte budget accrued.
    #[error("write deadline exceeded while waiting for byte budget")]
    DeadlineExceeded,
}

impl Error {
    /// Convert into the `io::Error` surfaced at the connection boundary.
    ///
    /// Deadline expiry maps to [`std::io::ErrorKind::TimedOut`] so callers
    /// can treat it like any other connection timeout.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Error::DeadlineExceeded => std::io::Error::new(std::io::ErrorKind::TimedOut, self),
            Error::InvalidRate(_) => std::io::Error::new(std::io::ErrorKind::InvalidInput, self),
        }
    }
}
