//! Storage layer
//!
//! `Storage` wraps the active backend with the per-entry memo cache and the
//! fallback adapter:
//! - reads are served from the memo when possible, then from the backend
//! - any backend failure is handed to the fallback adapter for the same key
//! - every successful write, delete and clear keeps the memo in lockstep
//!
//! Only failures the fallback could not absorb come back as `Err`, so
//! callers can still tell a miss (`Ok(None)`) from a broken backend.

use std::sync::Arc;

use super::entry::{expires_at_from_ttl, is_delete_sentinel, CacheKey, CacheValue};
use super::error::CacheError;
use super::fallback::{Fallback, FallbackAdapter};
use super::host::HostCache;
use super::memo::MemoCache;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::StorageBackend;

pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    fallback: FallbackAdapter,
    memo: Arc<MemoCache>,
    stats: CacheStatsTracker,
}

impl Storage {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        fallback_enabled: bool,
        host: Option<Arc<dyn HostCache>>,
    ) -> Self {
        let memo = Arc::new(MemoCache::new());
        Self {
            backend,
            fallback: FallbackAdapter::new(fallback_enabled, host, memo.clone()),
            memo,
            stats: CacheStatsTracker::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub async fn activate(&self, network_wide: bool) -> Result<(), CacheError> {
        self.memo.clear();
        self.backend.activate(network_wide).await.map_err(|err| {
            tracing::error!(backend = self.backend.name(), error = %err, "Backend activation failed");
            err
        })?;
        tracing::info!(backend = self.backend.name(), network_wide, "Backend activated");
        Ok(())
    }

    pub async fn deactivate(&self, network_wide: bool) -> Result<(), CacheError> {
        self.memo.clear();
        self.backend.deactivate(network_wide).await.map_err(|err| {
            tracing::error!(backend = self.backend.name(), error = %err, "Backend deactivation failed");
            err
        })?;
        tracing::info!(backend = self.backend.name(), network_wide, "Backend deactivated");
        Ok(())
    }

    /// Look up a value: memo, then backend, then (on failure) the host cache
    pub async fn get_value(&self, key: &str, group: &str) -> Result<Option<CacheValue>, CacheError> {
        if let Some(value) = self.memo.get(group, key) {
            self.stats.increment_hits();
            return Ok(Some(value));
        }

        let result = match self.backend.read(key, group).await {
            Ok(Some(entry)) => {
                tracing::debug!(backend = self.backend.name(), key = %key, group = %group, "Cache hit");
                self.memo
                    .insert(group, key, entry.value.clone(), entry.expires_at);
                Ok(Some(entry.value))
            }
            Ok(None) if self.backend.miss_consults_fallback() => {
                match self.fallback.get(key, group).await {
                    Fallback::Served(Some(value)) => {
                        self.stats.increment_fallbacks();
                        Ok(Some(value))
                    }
                    _ => Ok(None),
                }
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.stats.increment_errors();
                if err.is_unavailable() {
                    tracing::debug!(backend = self.backend.name(), key = %key, group = %group, "Backend unavailable for read");
                } else {
                    tracing::warn!(
                        backend = self.backend.name(),
                        key = %key,
                        group = %group,
                        error = %err,
                        "Backend read failed"
                    );
                }
                match self.fallback.get(key, group).await {
                    Fallback::Served(value) => {
                        self.stats.increment_fallbacks();
                        Ok(value)
                    }
                    Fallback::Refused => Err(err),
                }
            }
        };

        match &result {
            Ok(Some(_)) => self.stats.increment_hits(),
            Ok(None) => self.stats.increment_misses(),
            Err(_) => {}
        }

        result
    }

    /// Store, delete or clear following the sentinel rules
    ///
    /// Returns whether the value ended up stored (or removed) somewhere.
    pub async fn set_value(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        expires_in: u64,
        group: &str,
    ) -> Result<bool, CacheError> {
        let deleting = is_delete_sentinel(value);
        let expires_at = expires_at_from_ttl(expires_in);

        if let (CacheKey::Named(name), false) = (key, deleting) {
            if self.memo.holds(group, name, value, expires_at) {
                return Ok(true);
            }
        }

        match self.backend.set_value(key, value, expires_in, group).await {
            Ok(changed) => {
                self.stats.increment_writes();
                match (key, deleting) {
                    (CacheKey::All, _) => {
                        tracing::info!(backend = self.backend.name(), "Cache cleared");
                        self.memo.clear();
                    }
                    (CacheKey::Named(name), true) => {
                        tracing::debug!(backend = self.backend.name(), key = %name, group = %group, "Cache entry deleted");
                        self.memo.remove(group, name);
                        // The entry may only exist in the host cache from an earlier fallback write
                        if !changed
                            && self.backend.miss_consults_fallback()
                            && self.fallback.set(key, value, expires_in, group).await.is_served()
                        {
                            self.stats.increment_fallbacks();
                        }
                    }
                    (CacheKey::Named(name), false) => {
                        tracing::debug!(backend = self.backend.name(), key = %name, group = %group, expires_at, "Cache entry written");
                        self.memo.insert(group, name, value.clone(), expires_at);
                    }
                }
                Ok(true)
            }
            Err(err) if err.is_rejection() => {
                tracing::warn!(backend = self.backend.name(), key = %key, group = %group, error = %err, "Write rejected");
                Err(err)
            }
            Err(err) => {
                self.stats.increment_errors();
                if err.is_unavailable() {
                    tracing::debug!(backend = self.backend.name(), key = %key, group = %group, "Backend unavailable for write");
                } else {
                    tracing::warn!(
                        backend = self.backend.name(),
                        key = %key,
                        group = %group,
                        error = %err,
                        "Backend write failed"
                    );
                }

                if key.is_all() {
                    return self.clear_fallback(err).await.map(|_| true);
                }

                if let Some(name) = key.as_str() {
                    self.memo.remove(group, name);
                }
                match self.fallback.set(key, value, expires_in, group).await {
                    Fallback::Served(stored) => {
                        self.stats.increment_fallbacks();
                        Ok(stored)
                    }
                    Fallback::Refused => Err(err),
                }
            }
        }
    }

    /// Remove every entry and reset the memo
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.memo.clear();
        match self.backend.clear().await {
            Ok(()) => {
                tracing::info!(backend = self.backend.name(), "Cache cleared");
                Ok(())
            }
            Err(err) => {
                self.stats.increment_errors();
                tracing::warn!(backend = self.backend.name(), error = %err, "Backend clear failed");
                self.clear_fallback(err).await
            }
        }
    }

    async fn clear_fallback(&self, err: CacheError) -> Result<(), CacheError> {
        match self.fallback.clear().await {
            Fallback::Served(true) => {
                self.stats.increment_fallbacks();
                Ok(())
            }
            Fallback::Served(false) | Fallback::Refused => Err(err),
        }
    }
}
