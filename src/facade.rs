//! Cache facade
//!
//! The entry points a host calls around its own caching. Each one receives
//! the answer the host would use without us (`found`, `value`, `stored`) and
//! returns it unchanged whenever the alternate cache is disabled for the
//! requested mode, so a disabled cache is a pure pass-through.
//!
//! Backend failures never escape: whatever the storage layer and its fallback
//! could not absorb is logged here and reported as a miss or a failed write.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::cache::base::NullBackend;
use crate::cache::config::CacheConfig;
use crate::cache::entry::{is_delete_sentinel, CacheKey, CacheValue};
use crate::cache::host::HostCache;
use crate::cache::registry::{BackendRegistry, BackendSettings};
use crate::cache::stats::CacheStats;
use crate::cache::storage::Storage;
use crate::cache::traits::StorageBackend;
use crate::constants::DEBUG_BYPASS_ALL;
use crate::context::HostContext;

/// Single-slot memo of the last value found by `has_value`
#[derive(Debug, Clone)]
struct LastValue {
    key: String,
    group: String,
    value: CacheValue,
}

pub struct AltCache {
    config: Arc<CacheConfig>,
    context: Arc<dyn HostContext>,
    host: Option<Arc<dyn HostCache>>,
    registry: BackendRegistry,
    storage: Storage,
    last: Mutex<Option<LastValue>>,
}

impl AltCache {
    /// Build the configured backend from the default registry
    pub async fn new(
        config: CacheConfig,
        context: Arc<dyn HostContext>,
        host: Option<Arc<dyn HostCache>>,
    ) -> Self {
        Self::with_registry(config, context, host, BackendRegistry::with_defaults()).await
    }

    /// Build the configured backend from a host-supplied registry
    ///
    /// A backend that fails to build is replaced by the null backend, which
    /// defers every operation to the host cache.
    pub async fn with_registry(
        config: CacheConfig,
        context: Arc<dyn HostContext>,
        host: Option<Arc<dyn HostCache>>,
        registry: BackendRegistry,
    ) -> Self {
        let config = Arc::new(config);
        let settings = BackendSettings {
            config: config.clone(),
            tenant_id: context.tenant_id(),
        };

        let backend = match registry.build(&config.backend, settings).await {
            Ok(backend) => backend,
            Err(err) => {
                tracing::error!(backend = %config.backend, error = %err, "Failed to build cache backend, deferring to host cache");
                Arc::new(NullBackend::new()) as Arc<dyn StorageBackend>
            }
        };

        Self::assemble(config, context, host, registry, backend)
    }

    /// Use an already-built backend
    pub fn with_backend(
        config: CacheConfig,
        context: Arc<dyn HostContext>,
        host: Option<Arc<dyn HostCache>>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self::assemble(
            Arc::new(config),
            context,
            host,
            BackendRegistry::with_defaults(),
            backend,
        )
    }

    fn assemble(
        config: Arc<CacheConfig>,
        context: Arc<dyn HostContext>,
        host: Option<Arc<dyn HostCache>>,
        registry: BackendRegistry,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        tracing::debug!(
            backend = backend.name(),
            enabled = config.enabled,
            fallback_enabled = config.fallback_enabled,
            tenant_id = context.tenant_id(),
            "Alternate cache initialized"
        );

        let storage = Storage::new(backend, config.fallback_enabled, host.clone());
        Self {
            config,
            context,
            host,
            registry,
            storage,
            last: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn stats(&self) -> CacheStats {
        self.storage.stats()
    }

    /// Whether the alternate cache handles `mode`
    pub fn is_enabled(&self, mode: &str, key: &str) -> bool {
        let enabled = self.config.enabled && self.config.supports_mode(mode);
        if !enabled {
            tracing::trace!(mode = %mode, key = %key, "Alternate cache not enabled for mode");
        }
        enabled
    }

    /// "Do we already know the answer" check
    ///
    /// Returns `found` unchanged when it is already true or the cache is
    /// disabled. A privileged debug override reports true so that the host
    /// goes on to `get_value`, which then yields nothing: the net result for
    /// the host is a miss and the value is regenerated.
    pub async fn has_value(&self, found: bool, mode: &str, key: &str, group: &str) -> bool {
        if found || !self.is_enabled(mode, key) {
            return found;
        }

        if self.debug_bypass(mode) {
            return true;
        }

        match self.storage.get_value(key, group).await {
            Ok(Some(value)) => {
                *self.last.lock() = Some(LastValue {
                    key: key.to_string(),
                    group: group.to_string(),
                    value,
                });
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(key = %key, group = %group, error = %err, "Cache lookup failed");
                false
            }
        }
    }

    /// Fetch the cached value, or pass `value` through when disabled
    pub async fn get_value(
        &self,
        value: Option<CacheValue>,
        mode: &str,
        key: &str,
        group: &str,
    ) -> Option<CacheValue> {
        if !self.is_enabled(mode, key) {
            return value;
        }

        if self.debug_bypass(mode) {
            return None;
        }

        if let Some(last) = self.last_value(key, group) {
            return Some(last);
        }

        match self.storage.get_value(key, group).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %key, group = %group, error = %err, "Cache read failed");
                None
            }
        }
    }

    /// Store `value` unless another collaborator already did (`stored`)
    pub async fn set_check(
        &self,
        stored: bool,
        mode: &str,
        key: &CacheKey,
        value: &CacheValue,
        expires_in: u64,
        group: &str,
    ) -> bool {
        let key_name = key.as_str().unwrap_or_default();
        if stored || !self.is_enabled(mode, key_name) {
            return stored;
        }

        let result = self.storage.set_value(key, value, expires_in, group).await;
        let succeeded = matches!(result, Ok(true));
        self.sync_last(key, value, group, succeeded);

        match result {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(key = %key, group = %group, error = %err, "Cache write failed");
                false
            }
        }
    }

    /// Lifecycle hook run on install
    ///
    /// Flushes the host cache, tears down every other registered backend so
    /// no orphaned state is left behind, then prepares the active one.
    pub async fn activate(&self, network_wide: bool) -> bool {
        self.flush_host().await;
        *self.last.lock() = None;

        let active = self.storage.backend_name();
        for name in self.registry.names() {
            if name == active {
                continue;
            }

            let settings = BackendSettings {
                config: self.config.clone(),
                tenant_id: self.context.tenant_id(),
            };
            match self.registry.build(name, settings).await {
                Ok(backend) => {
                    if let Err(err) = backend.deactivate(network_wide).await {
                        tracing::warn!(backend = %name, error = %err, "Failed to deactivate inactive backend");
                    }
                }
                Err(err) => {
                    tracing::warn!(backend = %name, error = %err, "Failed to build inactive backend");
                }
            }
        }

        self.storage.activate(network_wide).await.is_ok()
    }

    /// Lifecycle hook run on uninstall
    pub async fn deactivate(&self, network_wide: bool) -> bool {
        self.flush_host().await;
        *self.last.lock() = None;
        self.storage.deactivate(network_wide).await.is_ok()
    }

    /// Remove every entry from the active backend
    pub async fn clear(&self) -> bool {
        *self.last.lock() = None;
        match self.storage.clear().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(backend = self.backend_name(), error = %err, "Cache clear failed");
                false
            }
        }
    }

    fn debug_bypass(&self, mode: &str) -> bool {
        if !self.context.is_privileged() {
            return false;
        }

        let bypass = matches!(
            self.context.request_param(&self.config.debug_param),
            Some(flag) if flag == DEBUG_BYPASS_ALL || flag == mode
        );
        if bypass {
            tracing::debug!(mode = %mode, "Debug override active, bypassing cache");
        }
        bypass
    }

    fn last_value(&self, key: &str, group: &str) -> Option<CacheValue> {
        self.last
            .lock()
            .as_ref()
            .filter(|last| last.key == key && last.group == group)
            .map(|last| last.value.clone())
    }

    fn sync_last(&self, key: &CacheKey, value: &CacheValue, group: &str, succeeded: bool) {
        let mut last = self.last.lock();

        let name = match key.as_str() {
            Some(name) => name,
            None => {
                *last = None;
                return;
            }
        };

        let matches = last
            .as_ref()
            .map(|last| last.key == name && last.group == group)
            .unwrap_or(false);
        if !matches {
            return;
        }

        if succeeded && !is_delete_sentinel(value) {
            *last = Some(LastValue {
                key: name.to_string(),
                group: group.to_string(),
                value: value.clone(),
            });
        } else {
            *last = None;
        }
    }

    async fn flush_host(&self) {
        if let Some(host) = &self.host {
            if !host.flush().await {
                tracing::warn!("Host cache flush failed");
            }
        }
    }
}
