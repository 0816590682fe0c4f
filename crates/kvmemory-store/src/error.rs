//! Error types for the kvmemory-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! Construction-time failures (`Configuration`, `Connection`, `Schema`)
//! abort store creation; the rest are returned per operation.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the entry store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Opening the pool or the liveness probe failed.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Creating the entries table or its indexes failed.
    #[error("schema error on `{table}`: {source}")]
    Schema {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// No entry matched a single-key lookup.
    #[error("entry not found: {key}")]
    NotFound { key: String },

    /// Saving an entry failed.
    #[error("save entry: {0}")]
    Persistence(#[source] sqlx::Error),

    /// A value cannot be represented in the backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other driver-level failure.
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether this error is the single-key lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        let err = StoreError::NotFound {
            key: "cfg:a".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "entry not found: cfg:a");
    }

    #[test]
    fn backend_errors_convert_from_sqlx() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn persistence_message_is_prefixed() {
        let err = StoreError::Persistence(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("save entry:"));
    }
}
