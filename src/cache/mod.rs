// Cache module
//
// Storage backends, key encoding, the memo and fallback layers that sit on
// top of them, and the registry used to pick a backend by name.

pub mod base;
pub mod config;
pub mod entry;
pub mod error;
pub mod fallback;
pub mod file;
pub mod host;
pub mod key;
pub mod memcached;
pub mod memo;
pub mod registry;
pub mod relational;
pub mod stats;
pub mod storage;
pub mod traits;

pub use base::NullBackend;
pub use config::{CacheConfig, FileBackendConfig, MemcachedBackendConfig, RelationalBackendConfig};
pub use entry::{CacheKey, CacheValue, StoredEntry};
pub use error::CacheError;
pub use fallback::{Fallback, FallbackAdapter};
pub use file::FileBackend;
pub use host::{HostCache, MemoryHostCache};
pub use key::{FileKeyEncoder, KeyEncoder, NamespacedKeyEncoder, TableKeyEncoder};
pub use memcached::MemcachedBackend;
pub use memo::MemoCache;
pub use registry::{BackendFactory, BackendRegistry, BackendSettings};
pub use relational::RelationalBackend;
pub use stats::{CacheStats, CacheStatsTracker};
pub use storage::Storage;
pub use traits::StorageBackend;
