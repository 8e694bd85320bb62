// Alternate cache library
//
// A pluggable key-value cache that sits beside a host application's own
// object cache and persists entries to files, a relational table or
// memcached.

pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod facade;
pub mod logging;

pub use cache::{CacheKey, CacheValue, HostCache, StorageBackend};
pub use context::{HostContext, StaticContext};
pub use facade::AltCache;
