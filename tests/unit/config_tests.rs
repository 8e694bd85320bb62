// Configuration module unit tests

use altcache::config::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_can_deserialize_full_yaml_config() {
    let yaml = r#"
cache:
  enabled: true
  backend: memcached
  fallback_enabled: false
  supported_modes: [transient, cache, option]
  debug_param: nocache
  file:
    cache_dir: /tmp/altcache-files
  relational:
    database_path: /tmp/altcache.db
    table_prefix: wp_
    table_name: podscache
  memcached:
    host: cache.internal
    port: 11311
    namespace: "site_"
    connect_timeout_ms: 250
logging:
  level: debug
  format: json
"#;
    let config = Config::from_yaml_with_env(yaml).expect("Failed to parse config");

    assert_eq!(config.cache.backend, "memcached");
    assert!(!config.cache.fallback_enabled);
    assert!(config.cache.supports_mode("option"));
    assert_eq!(config.cache.debug_param, "nocache");
    assert_eq!(config.cache.file.cache_dir, PathBuf::from("/tmp/altcache-files"));
    assert_eq!(config.cache.relational.table_prefix, "wp_");
    assert_eq!(config.cache.relational.table_name, "podscache");
    assert_eq!(config.cache.memcached.host, "cache.internal");
    assert_eq!(config.cache.memcached.port, 11311);
    assert_eq!(config.cache.memcached.namespace, "site_");
    assert_eq!(config.cache.memcached.connect_timeout_ms, 250);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_sections_fill_in_defaults() {
    let yaml = r#"
cache:
  backend: db
  memcached:
    port: 22122
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();

    assert!(config.cache.enabled);
    assert!(config.cache.fallback_enabled);
    assert_eq!(config.cache.backend, "db");
    assert_eq!(config.cache.memcached.host, "localhost");
    assert_eq!(config.cache.memcached.port, 22122);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_env_var_substitution() {
    std::env::set_var("ALTCACHE_TEST_MEMCACHED_HOST", "mc.example.internal");
    let yaml = r#"
cache:
  memcached:
    host: ${ALTCACHE_TEST_MEMCACHED_HOST}
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    assert_eq!(config.cache.memcached.host, "mc.example.internal");
}

#[test]
fn test_missing_env_var_is_an_error() {
    let yaml = r#"
cache:
  file:
    cache_dir: ${ALTCACHE_TEST_DEFINITELY_UNSET_VAR}
"#;
    let err = Config::from_yaml_with_env(yaml).unwrap_err();
    assert!(err.contains("ALTCACHE_TEST_DEFINITELY_UNSET_VAR"));
}

#[test]
fn test_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml_with_env("cache: [unclosed").is_err());
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  enabled: false\n").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert!(!config.cache.enabled);
}

#[test]
fn test_from_missing_file() {
    let err = Config::from_file("/nonexistent/altcache.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_validate_rejects_bad_values() {
    let yaml = r#"
cache:
  relational:
    table_name: "cache table"
"#;
    assert!(Config::from_yaml_with_env(yaml).unwrap().validate().is_err());

    let yaml = r#"
logging:
  level: chatty
"#;
    assert!(Config::from_yaml_with_env(yaml).unwrap().validate().is_err());
}

#[test]
fn test_unknown_log_format_fails_to_parse() {
    let yaml = r#"
logging:
  format: xml
"#;
    assert!(Config::from_yaml_with_env(yaml).is_err());
}
