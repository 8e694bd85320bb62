//! Cache statistics types
//!
//! This module provides structures for tracking storage activity:
//! - `CacheStats`: Serializable snapshot (hits, misses, writes, fallbacks, errors)
//! - `CacheStatsTracker`: Lock-free counters updated by the storage layer

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered with a value (memo, backend or fallback)
    pub hits: u64,
    /// Reads answered with "absent"
    pub misses: u64,
    /// Successful writes and deletes
    pub writes: u64,
    /// Operations answered by the host cache instead of the backend
    pub fallbacks: u64,
    /// Backend failures (whether or not the fallback recovered them)
    pub errors: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total reads)
    /// Returns 0.0 if there are no reads
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fallbacks(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
