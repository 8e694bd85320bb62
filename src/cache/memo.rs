//! In-process memo cache
//!
//! Remembers the last value read or written for each `(group, key)` during one
//! execution context so repeated lookups skip the backend. Entries carry their
//! expiry so a memoized value never outlives the stored one.

use parking_lot::Mutex;
use std::collections::HashMap;

use super::entry::{is_expired, now_unix, CacheValue};

#[derive(Debug, Clone)]
struct MemoEntry {
    value: CacheValue,
    expires_at: u64,
}

/// Per-context value memo keyed by `group + "_" + key`
#[derive(Debug, Default)]
pub struct MemoCache {
    values: Mutex<HashMap<String, MemoEntry>>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memo slot name for a `(group, key)` pair
    pub fn slot(group: &str, key: &str) -> String {
        format!("{}_{}", group, key)
    }

    pub fn get(&self, group: &str, key: &str) -> Option<CacheValue> {
        let slot = Self::slot(group, key);
        let mut values = self.values.lock();

        match values.get(&slot) {
            Some(entry) if is_expired(entry.expires_at, now_unix()) => {
                values.remove(&slot);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn insert(&self, group: &str, key: &str, value: CacheValue, expires_at: u64) {
        self.values
            .lock()
            .insert(Self::slot(group, key), MemoEntry { value, expires_at });
    }

    /// True when the memo already holds exactly this value and expiry
    pub fn holds(&self, group: &str, key: &str, value: &CacheValue, expires_at: u64) -> bool {
        self.values
            .lock()
            .get(&Self::slot(group, key))
            .map(|entry| entry.expires_at == expires_at && &entry.value == value)
            .unwrap_or(false)
    }

    pub fn remove(&self, group: &str, key: &str) {
        self.values.lock().remove(&Self::slot(group, key));
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_joins_group_and_key() {
        assert_eq!(MemoCache::slot("g", "k"), "g_k");
        assert_eq!(MemoCache::slot("", "k"), "_k");
    }

    #[test]
    fn test_insert_then_get() {
        let memo = MemoCache::new();
        memo.insert("g", "k", json!({"x": 1}), 0);
        assert_eq!(memo.get("g", "k"), Some(json!({"x": 1})));
        assert_eq!(memo.get("other", "k"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped_on_read() {
        let memo = MemoCache::new();
        memo.insert("g", "k", json!(1), 1);
        assert_eq!(memo.get("g", "k"), None);
        assert!(memo.is_empty());
    }

    #[test]
    fn test_holds_compares_value_and_expiry() {
        let memo = MemoCache::new();
        memo.insert("g", "k", json!("v"), 0);
        assert!(memo.holds("g", "k", &json!("v"), 0));
        assert!(!memo.holds("g", "k", &json!("v"), 10));
        assert!(!memo.holds("g", "k", &json!("w"), 0));
        assert!(!memo.holds("g", "missing", &json!("v"), 0));
    }

    #[test]
    fn test_remove_and_clear() {
        let memo = MemoCache::new();
        memo.insert("g", "a", json!(1), 0);
        memo.insert("g", "b", json!(2), 0);
        memo.remove("g", "a");
        assert_eq!(memo.len(), 1);
        memo.clear();
        assert!(memo.is_empty());
    }
}
