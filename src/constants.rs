// Constants module - centralized default values for configuration
//
// This module defines the default values and fixed layout constants used
// throughout the codebase.

// =============================================================================
// Facade defaults
// =============================================================================

/// Cache modes served when `supported_modes` is not configured
pub const DEFAULT_SUPPORTED_MODES: [&str; 2] = ["transient", "cache"];

/// Request parameter that triggers the privileged debug bypass
pub const DEFAULT_DEBUG_PARAM: &str = "altcache_debug";

/// Debug parameter value that bypasses every mode
pub const DEBUG_BYPASS_ALL: &str = "1";

/// Tenant used when the host does not run multiple tenants
pub const PRIMARY_TENANT_ID: u64 = 1;

// =============================================================================
// Backend names
// =============================================================================

pub const BACKEND_FILE: &str = "file";

pub const BACKEND_RELATIONAL: &str = "relational";

/// Alternate spelling accepted for the relational backend
pub const BACKEND_RELATIONAL_ALIAS: &str = "db";

pub const BACKEND_MEMCACHED: &str = "memcached";

// =============================================================================
// File backend
// =============================================================================

/// Default root directory for cache files
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/altcache";

/// Cache files keep a .php extension so the guard header stops direct delivery
pub const FILE_EXTENSION: &str = "php";

/// Written between the expiry word and the payload
pub const FILE_GUARD: &[u8] = b"\n<?php exit; ?>\n";

/// Size of the expiry word at the start of each file
pub const FILE_EXPIRY_LEN: usize = 4;

/// Payload offset in each cache file (expiry word + guard)
pub const FILE_HEADER_LEN: usize = FILE_EXPIRY_LEN + FILE_GUARD.len();

// =============================================================================
// Relational backend
// =============================================================================

/// Default SQLite database file
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/altcache/cache.db";

/// Default table name (before prefixing)
pub const DEFAULT_TABLE_NAME: &str = "altcache";

/// Default table prefix
pub const DEFAULT_TABLE_PREFIX: &str = "";

/// Column limit for `cache_key`
pub const MAX_TABLE_KEY_LENGTH: usize = 255;

/// How long a connection waits on a locked database, in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

// =============================================================================
// Memcached backend
// =============================================================================

pub const DEFAULT_MEMCACHED_HOST: &str = "localhost";

pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Prefix of every key this cache writes to a (possibly shared) server
pub const DEFAULT_MEMCACHED_NAMESPACE: &str = "altcache_";

/// Connection timeout in milliseconds
pub const DEFAULT_MEMCACHED_CONNECT_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// Host cache defaults
// =============================================================================

/// Maximum entries held by the in-memory host cache
pub const DEFAULT_HOST_CACHE_CAPACITY: u64 = 10_000;
