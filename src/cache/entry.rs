//! Cache key and entry types
//!
//! This module defines the core value types shared by every storage backend:
//! - `CacheValue`: The payload stored for a key (any JSON-serializable value)
//! - `CacheKey`: A caller key, or the clear-all sentinel
//! - `StoredEntry`: A value read back from a backend together with its expiry

use serde::{Deserialize, Serialize};

/// Payload stored under a key.
///
/// The empty string is reserved: writing it deletes the entry.
pub type CacheValue = serde_json::Value;

/// Key passed to a write operation
///
/// `All` is the clear-all sentinel. Combined with the empty-string value it
/// removes every entry instead of a single one; it never reaches a key encoder.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKey {
    /// A caller-supplied key of arbitrary length
    Named(String),
    /// Clear-all sentinel
    All,
}

impl CacheKey {
    /// Returns the caller key, or `None` for the clear-all sentinel
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheKey::Named(key) => Some(key.as_str()),
            CacheKey::All => None,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CacheKey::All)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::Named(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::Named(key)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Named(key) => write!(f, "{}", key),
            CacheKey::All => write!(f, "<all>"),
        }
    }
}

/// A value read back from a backend
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: CacheValue,
    /// Absolute Unix timestamp, 0 = never expires
    pub expires_at: u64,
}

impl StoredEntry {
    pub fn new(value: CacheValue, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        is_expired(self.expires_at, now)
    }
}

/// Returns true for the empty-string value that means "delete this entry"
pub fn is_delete_sentinel(value: &CacheValue) -> bool {
    matches!(value, CacheValue::String(s) if s.is_empty())
}

/// Current Unix time in seconds
pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Convert a relative TTL into an absolute expiry timestamp (0 stays "never")
pub fn expires_at_from_ttl(ttl_seconds: u64) -> u64 {
    if ttl_seconds == 0 {
        0
    } else {
        now_unix().saturating_add(ttl_seconds)
    }
}

/// An entry is expired once its nonzero expiry lies strictly in the past
pub fn is_expired(expires_at: u64, now: u64) -> bool {
    expires_at > 0 && expires_at < now
}
