//! Gate and runner error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while managing the shared client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The manager has been disconnected; no further leases are issued.
    #[error("pool is closed")]
    PoolClosed,

    /// The resource client could not be constructed.
    #[error("failed to create resource client: {0}")]
    ConnectionCreation(String),

    /// Pool or client configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// The resource client failed to shut down cleanly.
    #[error("failed to disconnect resource client: {0}")]
    Disconnect(String),
}

/// Outcome of a guarded operation that did not succeed.
///
/// `E` is the operation's own error type. It is carried through untouched in
/// [`RunError::Operation`], so callers can match on it exactly as if they had
/// invoked the operation directly.
#[derive(Debug, Error)]
pub enum RunError<E> {
    /// The operation did not settle before the deadline.
    #[error("Database operation timeout")]
    Timeout(Duration),

    /// The operation itself failed.
    #[error(transparent)]
    Operation(E),

    /// A lease could not be obtained.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl<E> RunError<E> {
    /// Returns `true` if the deadline won the race.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns the operation's error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Error)]
    #[error("row not found: {0}")]
    struct NotFound(u32);

    #[test]
    fn test_timeout_message() {
        let err: RunError<NotFound> = RunError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Database operation timeout");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_operation_error_is_transparent() {
        let err = RunError::Operation(NotFound(7));
        assert_eq!(err.to_string(), "row not found: 7");
        assert!(!err.is_timeout());
        assert_eq!(err.into_operation(), Some(NotFound(7)));
    }

    #[test]
    fn test_pool_error_conversion() {
        let err: RunError<NotFound> = PoolError::PoolClosed.into();
        assert_eq!(err.to_string(), "pool is closed");
        assert!(err.into_operation().is_none());
    }
}
