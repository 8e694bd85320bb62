//! Backend registry
//!
//! Maps backend names to async factories so the facade can build the
//! configured backend, and so activation can reach every other registered
//! backend to tear it down. Hosts may register their own backends next to the
//! built-in ones.

use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::CacheConfig;
use super::error::CacheError;
use super::file::FileBackend;
use super::memcached::MemcachedBackend;
use super::relational::RelationalBackend;
use super::traits::StorageBackend;
use crate::constants::{BACKEND_FILE, BACKEND_MEMCACHED, BACKEND_RELATIONAL, BACKEND_RELATIONAL_ALIAS};

/// Everything a factory needs to build its backend
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub config: Arc<CacheConfig>,
    pub tenant_id: u64,
}

pub type BackendFactory = Arc<
    dyn Fn(BackendSettings) -> BoxFuture<'static, Result<Arc<dyn StorageBackend>, CacheError>>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the file, relational and memcached backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(BACKEND_FILE, |settings: BackendSettings| {
            async move {
                let backend: Arc<dyn StorageBackend> =
                    Arc::new(FileBackend::from_config(&settings.config.file, settings.tenant_id));
                Ok::<_, CacheError>(backend)
            }
            .boxed()
        });

        registry.register(BACKEND_RELATIONAL, |settings: BackendSettings| {
            async move {
                let backend: Arc<dyn StorageBackend> = Arc::new(RelationalBackend::from_config(
                    &settings.config.relational,
                    settings.tenant_id,
                )?);
                Ok::<_, CacheError>(backend)
            }
            .boxed()
        });

        registry.register(BACKEND_MEMCACHED, |settings: BackendSettings| {
            async move {
                let backend: Arc<dyn StorageBackend> =
                    Arc::new(MemcachedBackend::connect(&settings.config.memcached).await);
                Ok::<_, CacheError>(backend)
            }
            .boxed()
        });

        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(BackendSettings) -> BoxFuture<'static, Result<Arc<dyn StorageBackend>, CacheError>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Canonical name for a configured backend
    ///
    /// `db` is accepted for the relational backend. Unknown names resolve to
    /// the file backend instead of failing startup.
    pub fn resolve_name(&self, name: &str) -> String {
        let name = name.trim().to_ascii_lowercase();
        let name = if name == BACKEND_RELATIONAL_ALIAS {
            BACKEND_RELATIONAL.to_string()
        } else {
            name
        };

        if self.contains(&name) {
            return name;
        }

        tracing::warn!(backend = %name, fallback = BACKEND_FILE, "Unknown cache backend, using file backend");
        BACKEND_FILE.to_string()
    }

    /// Build the backend registered under `name` (after alias resolution)
    pub async fn build(
        &self,
        name: &str,
        settings: BackendSettings,
    ) -> Result<Arc<dyn StorageBackend>, CacheError> {
        let resolved = self.resolve_name(name);
        let factory = self.factories.get(&resolved).ok_or_else(|| {
            CacheError::Configuration(format!("no backend registered under '{}'", resolved))
        })?;
        factory(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::base::NullBackend;

    fn settings() -> BackendSettings {
        BackendSettings {
            config: Arc::new(CacheConfig::default()),
            tenant_id: 1,
        }
    }

    #[test]
    fn test_defaults_are_registered() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["file", "memcached", "relational"]);
    }

    #[test]
    fn test_alias_and_unknown_names() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.resolve_name("db"), "relational");
        assert_eq!(registry.resolve_name("DB"), "relational");
        assert_eq!(registry.resolve_name("memcached"), "memcached");
        assert_eq!(registry.resolve_name("redis"), "file");
        assert_eq!(registry.resolve_name(""), "file");
    }

    #[tokio::test]
    async fn test_build_file_backend() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry.build("file", settings()).await.unwrap();
        assert_eq!(backend.name(), "file");

        let backend = registry.build("nonsense", settings()).await.unwrap();
        assert_eq!(backend.name(), "file");
    }

    #[tokio::test]
    async fn test_build_relational_via_alias() {
        let registry = BackendRegistry::with_defaults();
        let backend = registry.build("db", settings()).await.unwrap();
        assert_eq!(backend.name(), "relational");
    }

    #[tokio::test]
    async fn test_custom_backend_registration() {
        let mut registry = BackendRegistry::with_defaults();
        registry.register("null", |_settings: BackendSettings| {
            async {
                let backend: Arc<dyn StorageBackend> = Arc::new(NullBackend::new());
                Ok::<_, CacheError>(backend)
            }
            .boxed()
        });

        assert!(registry.contains("null"));
        let backend = registry.build("null", settings()).await.unwrap();
        assert_eq!(backend.name(), "null");
    }

    #[tokio::test]
    async fn test_empty_registry_cannot_build() {
        let registry = BackendRegistry::new();
        assert!(matches!(
            registry.build("file", settings()).await,
            Err(CacheError::Configuration(_))
        ));
    }
}
