//! Cache error types
//!
//! Every storage primitive returns `Result<_, CacheError>`. A miss is never an
//! error (`Ok(None)`); an `Err` always means the backend could not answer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem error (unreadable path, failed directory creation, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized for storage
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Relational backend failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Memcached protocol or server error
    #[error("Memcached error: {0}")]
    Memcached(String),

    /// Backend has no usable medium (disabled memcached client, base variant)
    #[error("Backend unavailable")]
    BackendUnavailable,

    /// Stored entry has an unreadable header
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// Invalid configuration or argument
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Blocking task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True when the error means the backend medium itself is unreachable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::BackendUnavailable)
    }

    /// True when the request itself was invalid, so no other store should
    /// take it over
    pub fn is_rejection(&self) -> bool {
        matches!(self, CacheError::Configuration(_))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_converts_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
        assert!(cache_err.to_string().contains("access denied"));
    }

    #[test]
    fn test_cache_error_converts_from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let cache_err: CacheError = serde_err.into();
        assert!(matches!(cache_err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_only_backend_unavailable_reports_unavailable() {
        assert!(CacheError::BackendUnavailable.is_unavailable());
        assert!(!CacheError::Memcached("boom".to_string()).is_unavailable());
    }

    #[test]
    fn test_only_configuration_errors_are_rejections() {
        assert!(CacheError::Configuration("bad".to_string()).is_rejection());
        assert!(!CacheError::BackendUnavailable.is_rejection());
        assert!(!CacheError::Memcached("down".to_string()).is_rejection());
    }

    #[test]
    fn test_cache_error_implements_error_trait() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<CacheError>();
    }
}
