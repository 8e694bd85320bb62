//! Memcached storage backend
//!
//! Keys are `namespace + md5(key + "_" + group)`, so the server can be shared
//! with unrelated consumers: `clear` only removes keys carrying the namespace.
//! Expiration is left to the server's own TTL handling.
//!
//! A failed connection does not abort construction; the backend comes up
//! disabled and every data operation reports it unavailable, which routes the
//! call to the fallback adapter. A connection left out of sync by an
//! interrupted request is dropped and replaced before the next command.

pub mod client;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::config::MemcachedBackendConfig;
use super::entry::{CacheValue, StoredEntry};
use super::error::CacheError;
use super::key::{KeyEncoder, NamespacedKeyEncoder};
use super::traits::StorageBackend;
use crate::constants::BACKEND_MEMCACHED;

pub use client::MemcachedClient;

pub struct MemcachedBackend {
    address: String,
    connect_timeout: Duration,
    enabled: bool,
    client: Mutex<Option<MemcachedClient>>,
    encoder: NamespacedKeyEncoder,
}

impl MemcachedBackend {
    /// Connect to the configured server, coming up disabled on failure
    pub async fn connect(config: &MemcachedBackendConfig) -> Self {
        let address = format!("{}:{}", config.host, config.port);
        let timeout = Duration::from_millis(config.connect_timeout_ms);

        let client = match MemcachedClient::connect(&address, timeout).await {
            Ok(client) => {
                tracing::info!(address = %address, "Connected to memcached");
                Some(client)
            }
            Err(err) => {
                tracing::warn!(address = %address, error = %err, "Memcached unreachable, backend disabled");
                None
            }
        };

        Self {
            address,
            connect_timeout: timeout,
            enabled: client.is_some(),
            client: Mutex::new(client),
            encoder: NamespacedKeyEncoder::new(config.namespace.clone()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the server was reachable when the backend was built
    pub fn is_connected(&self) -> bool {
        self.enabled
    }

    /// Exclusive use of the connection slot, holding a client in sync with
    /// the server
    async fn client(&self) -> Result<MutexGuard<'_, Option<MemcachedClient>>, CacheError> {
        if !self.enabled {
            return Err(CacheError::BackendUnavailable);
        }

        let mut slot = self.client.lock().await;
        if slot.as_ref().is_some_and(|client| !client.is_in_sync()) {
            tracing::warn!(address = %self.address, "Dropping memcached connection left mid-request");
            *slot = None;
        }

        if slot.is_none() {
            match MemcachedClient::connect(&self.address, self.connect_timeout).await {
                Ok(client) => {
                    tracing::debug!(address = %self.address, "Reconnected to memcached");
                    *slot = Some(client);
                }
                Err(err) => {
                    tracing::warn!(address = %self.address, error = %err, "Memcached reconnect failed");
                    return Err(CacheError::BackendUnavailable);
                }
            }
        }

        Ok(slot)
    }
}

fn connected<'a>(
    slot: &'a mut MutexGuard<'_, Option<MemcachedClient>>,
) -> Result<&'a mut MemcachedClient, CacheError> {
    slot.as_mut().ok_or(CacheError::BackendUnavailable)
}

#[async_trait]
impl StorageBackend for MemcachedBackend {
    fn name(&self) -> &'static str {
        BACKEND_MEMCACHED
    }

    async fn activate(&self, _network_wide: bool) -> Result<(), CacheError> {
        Ok(())
    }

    async fn deactivate(&self, _network_wide: bool) -> Result<(), CacheError> {
        if !self.is_connected() {
            tracing::warn!(address = %self.address, "Memcached unreachable, namespaced keys left in place");
            return Ok(());
        }
        self.clear().await
    }

    async fn read(&self, key: &str, group: &str) -> Result<Option<StoredEntry>, CacheError> {
        let raw_key = self.encoder.encode(key, group);
        let mut slot = self.client().await?;
        let data = connected(&mut slot)?.get(&raw_key).await?;
        drop(slot);

        let data = match data {
            Some(data) => data,
            None => return Ok(None),
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(StoredEntry::new(value, 0))),
            Err(err) => {
                tracing::warn!(key = %key, group = %group, error = %err, "Ignoring corrupt memcached item");
                Ok(None)
            }
        }
    }

    async fn write(
        &self,
        key: &str,
        value: &CacheValue,
        expires_at: u64,
        group: &str,
    ) -> Result<(), CacheError> {
        let raw_key = self.encoder.encode(key, group);
        let payload = serde_json::to_vec(value)?;

        // Absolute timestamps are past the 30-day threshold, so the server
        // treats them as absolute rather than relative
        let mut slot = self.client().await?;
        let stored = connected(&mut slot)?
            .set(&raw_key, &payload, expires_at)
            .await?;
        drop(slot);

        if !stored {
            return Err(CacheError::Memcached(format!("item {} not stored", raw_key)));
        }

        tracing::debug!(key = %key, group = %group, expires_at, "Memcached item written");
        Ok(())
    }

    async fn delete(&self, key: &str, group: &str) -> Result<bool, CacheError> {
        let raw_key = self.encoder.encode(key, group);
        let mut slot = self.client().await?;
        connected(&mut slot)?.delete(&raw_key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut slot = self.client().await?;
        let client = connected(&mut slot)?;

        let owned: Vec<String> = client
            .keys()
            .await?
            .into_iter()
            .filter(|raw_key| self.encoder.owns(raw_key))
            .collect();

        for raw_key in &owned {
            client.delete(raw_key).await?;
        }

        tracing::debug!(namespace = %self.encoder.namespace(), removed = owned.len(), "Memcached namespace cleared");
        Ok(())
    }
}
