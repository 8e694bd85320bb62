//! Cache configuration types
//!
//! This module defines configuration structures for the cache layer:
//! - Master switch, backend selection and fallback kill switch
//! - File backend configuration
//! - Relational backend configuration
//! - Memcached backend configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::relational::table_name;
use crate::constants::{
    BACKEND_FILE, DEFAULT_CACHE_DIR, DEFAULT_DATABASE_PATH, DEFAULT_DEBUG_PARAM,
    DEFAULT_MEMCACHED_CONNECT_TIMEOUT_MS, DEFAULT_MEMCACHED_HOST, DEFAULT_MEMCACHED_NAMESPACE,
    DEFAULT_MEMCACHED_PORT, DEFAULT_SUPPORTED_MODES, DEFAULT_TABLE_NAME, DEFAULT_TABLE_PREFIX,
    PRIMARY_TENANT_ID,
};

/// Main cache configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Backend name; unknown names resolve to the file backend
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_supported_modes")]
    pub supported_modes: Vec<String>,
    /// Request parameter that triggers the debug override
    #[serde(default = "default_debug_param")]
    pub debug_param: String,
    #[serde(default)]
    pub file: FileBackendConfig,
    #[serde(default)]
    pub relational: RelationalBackendConfig,
    #[serde(default)]
    pub memcached: MemcachedBackendConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_backend(),
            fallback_enabled: true,
            supported_modes: default_supported_modes(),
            debug_param: default_debug_param(),
            file: FileBackendConfig::default(),
            relational: RelationalBackendConfig::default(),
            memcached: MemcachedBackendConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    BACKEND_FILE.to_string()
}

fn default_supported_modes() -> Vec<String> {
    DEFAULT_SUPPORTED_MODES.iter().map(|m| m.to_string()).collect()
}

fn default_debug_param() -> String {
    DEFAULT_DEBUG_PARAM.to_string()
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        self.file.validate()?;
        self.relational.validate()?;
        self.memcached.validate()?;

        if self.debug_param.trim().is_empty() {
            return Err("debug_param cannot be empty".to_string());
        }

        if self.supported_modes.iter().any(|mode| mode.trim().is_empty()) {
            return Err("supported_modes cannot contain empty entries".to_string());
        }

        Ok(())
    }

    pub fn supports_mode(&self, mode: &str) -> bool {
        self.supported_modes.iter().any(|m| m == mode)
    }
}

/// File backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackendConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

impl FileBackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("file.cache_dir cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Relational backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalBackendConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

impl Default for RelationalBackendConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            table_prefix: default_table_prefix(),
            table_name: default_table_name(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

impl RelationalBackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("relational.database_path cannot be empty".to_string());
        }
        table_name(&self.table_prefix, PRIMARY_TENANT_ID, &self.table_name)
            .map_err(|err| format!("relational: {}", err))?;
        Ok(())
    }
}

/// Memcached backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemcachedBackendConfig {
    #[serde(default = "default_memcached_host")]
    pub host: String,
    #[serde(default = "default_memcached_port")]
    pub port: u16,
    #[serde(default = "default_memcached_namespace")]
    pub namespace: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for MemcachedBackendConfig {
    fn default() -> Self {
        Self {
            host: default_memcached_host(),
            port: default_memcached_port(),
            namespace: default_memcached_namespace(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_memcached_host() -> String {
    DEFAULT_MEMCACHED_HOST.to_string()
}

fn default_memcached_port() -> u16 {
    DEFAULT_MEMCACHED_PORT
}

fn default_memcached_namespace() -> String {
    DEFAULT_MEMCACHED_NAMESPACE.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_MEMCACHED_CONNECT_TIMEOUT_MS
}

impl MemcachedBackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("memcached.host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("memcached.port must be greater than 0".to_string());
        }
        if self.namespace.is_empty() {
            // An empty namespace would let clear() delete foreign keys
            return Err("memcached.namespace cannot be empty".to_string());
        }
        if self.namespace.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err("memcached.namespace cannot contain whitespace".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("memcached.connect_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(config.fallback_enabled);
        assert_eq!(config.backend, "file");
        assert!(config.supports_mode("transient"));
        assert!(config.supports_mode("cache"));
        assert!(!config.supports_mode("option"));
        assert_eq!(config.memcached.host, "localhost");
        assert_eq!(config.memcached.port, 11211);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: CacheConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.debug_param, "altcache_debug");
        assert_eq!(config.relational.table_name, "altcache");
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = CacheConfig::default();
        config.relational.table_prefix = "wp-".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_namespace() {
        let mut config = CacheConfig::default();
        config.memcached.namespace = String::new();
        assert!(config.validate().unwrap_err().contains("namespace"));
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut config = CacheConfig::default();
        config.memcached.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_is_not_a_validation_error() {
        let mut config = CacheConfig::default();
        config.backend = "redis".to_string();
        assert!(config.validate().is_ok());
    }
}
