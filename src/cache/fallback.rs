//! Fallback adapter
//!
//! Routes an operation the primary backend could not complete to the host's
//! secondary cache and mirrors the result into the memo cache. The adapter
//! refuses to engage when fallback is switched off in configuration or when
//! no host cache is attached; the caller then keeps its original failure.

use std::sync::Arc;

use super::entry::{expires_at_from_ttl, is_delete_sentinel, CacheKey, CacheValue};
use super::host::HostCache;
use super::memo::MemoCache;

/// Result of asking the fallback adapter to take over an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback<T> {
    /// The adapter did not engage; the original result stands
    Refused,
    /// The host cache answered
    Served(T),
}

impl<T> Fallback<T> {
    pub fn is_served(&self) -> bool {
        matches!(self, Fallback::Served(_))
    }
}

pub struct FallbackAdapter {
    enabled: bool,
    host: Option<Arc<dyn HostCache>>,
    memo: Arc<MemoCache>,
}

impl FallbackAdapter {
    pub fn new(enabled: bool, host: Option<Arc<dyn HostCache>>, memo: Arc<MemoCache>) -> Self {
        Self {
            enabled,
            host,
            memo,
        }
    }

    /// Adapter with no host cache attached; refuses every operation
    pub fn detached(memo: Arc<MemoCache>) -> Self {
        Self::new(false, None, memo)
    }

    fn host(&self) -> Option<&Arc<dyn HostCache>> {
        if !self.enabled {
            return None;
        }
        self.host.as_ref()
    }

    /// Read a value from the host cache
    pub async fn get(&self, key: &str, group: &str) -> Fallback<Option<CacheValue>> {
        let host = match self.host() {
            Some(host) if host.is_external() => host,
            _ => return Fallback::Refused,
        };

        match host.get_entry(key, group).await {
            Some(entry) => {
                tracing::debug!(key = %key, group = %group, "Served from host cache");
                self.memo
                    .insert(group, key, entry.value.clone(), entry.expires_at);
                Fallback::Served(Some(entry.value))
            }
            None => Fallback::Served(None),
        }
    }

    /// Write (or delete, for the empty value) a value in the host cache
    pub async fn set(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        expires_in: u64,
        group: &str,
    ) -> Fallback<bool> {
        let host = match self.host() {
            Some(host) => host,
            None => return Fallback::Refused,
        };

        let key = match key.as_str() {
            Some(key) if !key.is_empty() => key,
            _ => return Fallback::Refused,
        };

        let stored = host.set(key, value, group, expires_in).await;
        if stored {
            tracing::debug!(key = %key, group = %group, "Stored in host cache");
            if is_delete_sentinel(value) {
                self.memo.remove(group, key);
            } else {
                self.memo
                    .insert(group, key, value.clone(), expires_at_from_ttl(expires_in));
            }
        }

        Fallback::Served(stored)
    }

    /// Flush the host cache
    pub async fn clear(&self) -> Fallback<bool> {
        let host = match self.host() {
            Some(host) => host,
            None => return Fallback::Refused,
        };

        self.memo.clear();
        Fallback::Served(host.flush().await)
    }
}
