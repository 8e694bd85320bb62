//! Host secondary cache
//!
//! The host application's own object cache, used only by the fallback
//! adapter when the primary backend cannot answer:
//! - `HostCache`: the collaborator contract (get / set / flush)
//! - `MemoryHostCache`: an in-process implementation backed by moka with
//!   per-entry TTL, for hosts without a cache of their own and for tests

use async_trait::async_trait;
use moka::Expiry;
use std::time::{Duration, Instant};

use super::entry::{expires_at_from_ttl, is_delete_sentinel, CacheValue, StoredEntry};
use crate::constants::DEFAULT_HOST_CACHE_CAPACITY;

/// The host application's native cache
#[async_trait]
pub trait HostCache: Send + Sync {
    /// Look up a value; `None` means not found
    async fn get(&self, key: &str, group: &str) -> Option<CacheValue>;

    /// Look up a value together with its absolute expiry
    ///
    /// Hosts that cannot report an expiry keep the default, which reports 0
    /// (never expires); memoized copies then live for the whole context.
    async fn get_entry(&self, key: &str, group: &str) -> Option<StoredEntry> {
        self.get(key, group)
            .await
            .map(|value| StoredEntry::new(value, 0))
    }

    /// Store a value with a relative TTL in seconds (0 = no expiry)
    async fn set(&self, key: &str, value: &CacheValue, group: &str, ttl: u64) -> bool;

    /// Drop everything
    async fn flush(&self) -> bool;

    /// Whether the cache outlives the current execution context
    ///
    /// Fallback reads are only attempted against external caches; an
    /// in-request cache would only echo what the memo already holds.
    fn is_external(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct HostEntry {
    value: CacheValue,
    ttl: Option<Duration>,
    expires_at: u64,
}

struct HostEntryExpiry;

impl Expiry<(String, String), HostEntry> for HostEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &(String, String),
        value: &HostEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &(String, String),
        value: &HostEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// moka-backed host cache
pub struct MemoryHostCache {
    cache: moka::future::Cache<(String, String), HostEntry>,
    external: bool,
}

impl Default for MemoryHostCache {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_CACHE_CAPACITY)
    }
}

impl MemoryHostCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .expire_after(HostEntryExpiry)
            .build();

        Self {
            cache,
            external: true,
        }
    }

    /// Mark this cache as request-local, which disables fallback reads
    pub fn request_local(mut self) -> Self {
        self.external = false;
        self
    }

    fn slot(key: &str, group: &str) -> (String, String) {
        (group.to_string(), key.to_string())
    }
}

#[async_trait]
impl HostCache for MemoryHostCache {
    async fn get(&self, key: &str, group: &str) -> Option<CacheValue> {
        self.cache
            .get(&Self::slot(key, group))
            .await
            .map(|entry| entry.value)
    }

    async fn get_entry(&self, key: &str, group: &str) -> Option<StoredEntry> {
        self.cache
            .get(&Self::slot(key, group))
            .await
            .map(|entry| StoredEntry::new(entry.value, entry.expires_at))
    }

    async fn set(&self, key: &str, value: &CacheValue, group: &str, ttl: u64) -> bool {
        let slot = Self::slot(key, group);

        if is_delete_sentinel(value) {
            self.cache.invalidate(&slot).await;
            return true;
        }

        let entry = HostEntry {
            value: value.clone(),
            ttl: (ttl > 0).then(|| Duration::from_secs(ttl)),
            expires_at: expires_at_from_ttl(ttl),
        };
        self.cache.insert(slot, entry).await;
        true
    }

    async fn flush(&self) -> bool {
        self.cache.invalidate_all();
        true
    }

    fn is_external(&self) -> bool {
        self.external
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::now_unix;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get() {
        let host = MemoryHostCache::default();
        assert!(host.set("k", &json!({"a": 1}), "g", 0).await);
        assert_eq!(host.get("k", "g").await, Some(json!({"a": 1})));
        assert_eq!(host.get("k", "other").await, None);
    }

    #[tokio::test]
    async fn test_empty_value_removes_entry() {
        let host = MemoryHostCache::default();
        host.set("k", &json!(1), "g", 0).await;
        assert!(host.set("k", &json!(""), "g", 0).await);
        assert_eq!(host.get("k", "g").await, None);
    }

    #[tokio::test]
    async fn test_flush_drops_everything() {
        let host = MemoryHostCache::default();
        host.set("a", &json!(1), "g", 0).await;
        host.set("b", &json!(2), "h", 0).await;
        assert!(host.flush().await);
        assert_eq!(host.get("a", "g").await, None);
        assert_eq!(host.get("b", "h").await, None);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let host = MemoryHostCache::default();
        host.set("k", &json!(1), "g", 1).await;
        assert_eq!(host.get("k", "g").await, Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(host.get("k", "g").await, None);
    }

    #[tokio::test]
    async fn test_get_entry_reports_expiry() {
        let host = MemoryHostCache::default();
        host.set("forever", &json!(1), "g", 0).await;
        host.set("soon", &json!(2), "g", 60).await;

        assert_eq!(host.get_entry("forever", "g").await.unwrap().expires_at, 0);
        let entry = host.get_entry("soon", "g").await.unwrap();
        assert_eq!(entry.value, json!(2));
        assert!(entry.expires_at >= now_unix() + 59);
        assert_eq!(host.get_entry("missing", "g").await, None);
    }

    #[test]
    fn test_request_local_is_not_external() {
        assert!(MemoryHostCache::default().is_external());
        assert!(!MemoryHostCache::default().request_local().is_external());
    }
}
