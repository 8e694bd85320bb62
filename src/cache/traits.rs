//! Storage backend trait definition
//!
//! This module defines the `StorageBackend` trait that every physical medium
//! (file tree, relational table, memcached) implements. The trait provides the
//! raw primitives; `set_value` and `get_value` are provided on top of them so
//! the delete and clear-all sentinel rules live in exactly one place.

use async_trait::async_trait;

use super::entry::{expires_at_from_ttl, is_delete_sentinel, CacheKey, CacheValue, StoredEntry};
use super::error::CacheError;

/// Storage backend for one physical medium
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Registry name of this backend ("file", "relational", "memcached", ...)
    fn name(&self) -> &'static str;

    /// Prepare the medium for use. Must be idempotent.
    async fn activate(&self, network_wide: bool) -> Result<(), CacheError>;

    /// Tear down backend-owned resources. Must be idempotent.
    async fn deactivate(&self, network_wide: bool) -> Result<(), CacheError>;

    /// Read one entry
    ///
    /// Returns `Ok(None)` on a miss. Expired entries are deleted and reported
    /// as a miss.
    async fn read(&self, key: &str, group: &str) -> Result<Option<StoredEntry>, CacheError>;

    /// Store one entry, replacing any previous value
    ///
    /// `expires_at` is an absolute Unix timestamp, 0 = never.
    async fn write(
        &self,
        key: &str,
        value: &CacheValue,
        expires_at: u64,
        group: &str,
    ) -> Result<(), CacheError>;

    /// Delete one entry
    /// Returns true if the entry existed
    async fn delete(&self, key: &str, group: &str) -> Result<bool, CacheError>;

    /// Remove every entry written by this backend
    async fn clear(&self) -> Result<(), CacheError>;

    /// Whether a plain miss should still be looked up in the host cache
    ///
    /// Backends whose writes fall back to the host cache on routine failures
    /// find those values again through this path.
    fn miss_consults_fallback(&self) -> bool {
        false
    }

    /// Return the stored value, or `None` when absent or expired
    async fn get_value(&self, key: &str, group: &str) -> Result<Option<CacheValue>, CacheError> {
        Ok(self.read(key, group).await?.map(|entry| entry.value))
    }

    /// Store, delete or clear according to the sentinel rules
    ///
    /// - empty-string value + `CacheKey::All`: clear everything
    /// - empty-string value + named key: delete that entry
    /// - any other value: store it with `expires_in` seconds to live (0 = never)
    ///
    /// Returns whether an entry was written or removed.
    async fn set_value(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        expires_in: u64,
        group: &str,
    ) -> Result<bool, CacheError> {
        match (key, is_delete_sentinel(value)) {
            (CacheKey::All, true) => {
                self.clear().await?;
                Ok(true)
            }
            (CacheKey::Named(key), true) => self.delete(key, group).await,
            (CacheKey::Named(key), false) => {
                self.write(key, value, expires_at_from_ttl(expires_in), group)
                    .await?;
                Ok(true)
            }
            (CacheKey::All, false) => Err(CacheError::Configuration(
                "the clear-all key only accepts the empty value".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    // Mock backend recording which primitive the provided methods dispatch to
    #[derive(Default)]
    struct MockBackend {
        entries: Mutex<HashMap<(String, String), StoredEntry>>,
        clears: Mutex<usize>,
    }

    #[async_trait]
    impl StorageBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn activate(&self, _network_wide: bool) -> Result<(), CacheError> {
            Ok(())
        }

        async fn deactivate(&self, _network_wide: bool) -> Result<(), CacheError> {
            Ok(())
        }

        async fn read(&self, key: &str, group: &str) -> Result<Option<StoredEntry>, CacheError> {
            Ok(self
                .entries
                .lock()
                .get(&(key.to_string(), group.to_string()))
                .cloned())
        }

        async fn write(
            &self,
            key: &str,
            value: &CacheValue,
            expires_at: u64,
            group: &str,
        ) -> Result<(), CacheError> {
            self.entries.lock().insert(
                (key.to_string(), group.to_string()),
                StoredEntry::new(value.clone(), expires_at),
            );
            Ok(())
        }

        async fn delete(&self, key: &str, group: &str) -> Result<bool, CacheError> {
            Ok(self
                .entries
                .lock()
                .remove(&(key.to_string(), group.to_string()))
                .is_some())
        }

        async fn clear(&self) -> Result<(), CacheError> {
            self.entries.lock().clear();
            *self.clears.lock() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_set_value_writes_non_empty_values() {
        let backend = MockBackend::default();
        let stored = backend
            .set_value(&"k".into(), &json!({"x": 1}), 0, "g")
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(
            backend.get_value("k", "g").await.unwrap(),
            Some(json!({"x": 1}))
        );
    }

    #[tokio::test]
    async fn test_set_value_converts_ttl_to_absolute_expiry() {
        let backend = MockBackend::default();
        backend
            .set_value(&"k".into(), &json!(1), 30, "g")
            .await
            .unwrap();
        let entry = backend.read("k", "g").await.unwrap().unwrap();
        assert!(entry.expires_at >= super::super::entry::now_unix() + 29);
    }

    #[tokio::test]
    async fn test_empty_value_deletes_single_entry() {
        let backend = MockBackend::default();
        backend.set_value(&"a".into(), &json!(1), 0, "g").await.unwrap();
        backend.set_value(&"b".into(), &json!(2), 0, "g").await.unwrap();

        let deleted = backend.set_value(&"a".into(), &json!(""), 0, "g").await.unwrap();
        assert!(deleted);
        assert_eq!(backend.get_value("a", "g").await.unwrap(), None);
        assert_eq!(backend.get_value("b", "g").await.unwrap(), Some(json!(2)));
        assert_eq!(*backend.clears.lock(), 0);
    }

    #[tokio::test]
    async fn test_clear_all_sentinel_clears_every_group() {
        let backend = MockBackend::default();
        backend.set_value(&"a".into(), &json!(1), 0, "g1").await.unwrap();
        backend.set_value(&"b".into(), &json!(2), 0, "g2").await.unwrap();

        backend.set_value(&CacheKey::All, &json!(""), 0, "").await.unwrap();
        assert_eq!(*backend.clears.lock(), 1);
        assert_eq!(backend.get_value("a", "g1").await.unwrap(), None);
        assert_eq!(backend.get_value("b", "g2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_all_key_rejects_real_values() {
        let backend = MockBackend::default();
        let result = backend.set_value(&CacheKey::All, &json!(1), 0, "").await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_backend_trait_is_object_safe() {
        fn _assert_object(_b: &dyn StorageBackend) {}
        let backend = MockBackend::default();
        assert!(!backend.miss_consults_fallback());
        _assert_object(&backend);
    }
}
