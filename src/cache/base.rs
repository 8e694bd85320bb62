//! Base storage backend
//!
//! `NullBackend` has no medium of its own: every data operation reports the
//! backend as unavailable so the storage layer hands it to the host cache.
//! Lifecycle hooks succeed because there is nothing to prepare.

use async_trait::async_trait;

use super::entry::{CacheValue, StoredEntry};
use super::error::CacheError;
use super::traits::StorageBackend;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn activate(&self, _network_wide: bool) -> Result<(), CacheError> {
        Ok(())
    }

    async fn deactivate(&self, _network_wide: bool) -> Result<(), CacheError> {
        Ok(())
    }

    async fn read(&self, _key: &str, _group: &str) -> Result<Option<StoredEntry>, CacheError> {
        Err(CacheError::BackendUnavailable)
    }

    async fn write(
        &self,
        _key: &str,
        _value: &CacheValue,
        _expires_at: u64,
        _group: &str,
    ) -> Result<(), CacheError> {
        Err(CacheError::BackendUnavailable)
    }

    async fn delete(&self, _key: &str, _group: &str) -> Result<bool, CacheError> {
        Err(CacheError::BackendUnavailable)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(CacheError::BackendUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lifecycle_hooks_succeed() {
        let backend = NullBackend::new();
        assert!(backend.activate(false).await.is_ok());
        assert!(backend.activate(true).await.is_ok());
        assert!(backend.deactivate(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_data_operations_report_unavailable() {
        let backend = NullBackend::new();
        assert!(matches!(
            backend.read("k", "g").await,
            Err(CacheError::BackendUnavailable)
        ));
        assert!(matches!(
            backend.write("k", &json!(1), 0, "g").await,
            Err(CacheError::BackendUnavailable)
        ));
        assert!(matches!(
            backend.delete("k", "g").await,
            Err(CacheError::BackendUnavailable)
        ));
        assert!(matches!(
            backend.clear().await,
            Err(CacheError::BackendUnavailable)
        ));
    }
}
