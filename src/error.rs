//! Error types for geoquery-core.

use thiserror::Error;

/// Errors produced while building a query plan, computing a covering, or
/// running a fanout/paginated execution.
#[derive(Debug, Error)]
pub enum GeoQueryError {
    /// The caller passed a shape, precision, or configuration value that
    /// cannot produce a valid query. Raised before any store I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A covering exceeded `max_cells` and truncation was not allowed.
    #[error("covering produced more than {limit} cells ({found} found)")]
    TooManyCells {
        /// The configured ceiling.
        limit: usize,
        /// The number of cells enumerated before the search was aborted.
        found: usize,
    },

    /// A continuation token failed to decode, or its fingerprint does not
    /// match the query it was presented with.
    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    /// The caller's `StoreDriver` returned an error.
    #[error("store error: {source}")]
    StoreError {
        /// Whether this error is safe to retry with backoff.
        retryable: bool,
        /// The underlying error from the store driver.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl GeoQueryError {
    /// Build an [`GeoQueryError::InvalidInput`] from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Build a [`GeoQueryError::StoreError`], marking it retryable.
    pub fn retryable_store_error(
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreError {
            retryable: true,
            source: Box::new(source),
        }
    }

    /// Build a [`GeoQueryError::StoreError`], marking it fatal.
    pub fn fatal_store_error(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StoreError {
            retryable: false,
            source: Box::new(source),
        }
    }

    /// Whether a retry loop should attempt this error again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreError { retryable: true, .. })
    }
}

/// Result type alias for geoquery-core operations.
pub type Result<T> = std::result::Result<T, GeoQueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn invalid_input_formats_message() {
        let err = GeoQueryError::invalid_input("precision out of range");
        assert_eq!(err.to_string(), "invalid input: precision out of range");
    }

    #[test]
    fn store_error_retryability() {
        let retryable = GeoQueryError::retryable_store_error(io::Error::new(
            io::ErrorKind::TimedOut,
            "timeout",
        ));
        assert!(retryable.is_retryable());

        let fatal = GeoQueryError::fatal_store_error(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn too_many_cells_message() {
        let err = GeoQueryError::TooManyCells {
            limit: 500,
            found: 612,
        };
        assert_eq!(
            err.to_string(),
            "covering produced more than 500 cells (612 found)"
        );
    }
}
