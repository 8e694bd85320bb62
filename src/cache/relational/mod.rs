//! Relational table storage backend
//!
//! Entries live in one SQLite table:
//!
//! ```sql
//! cache_key   VARCHAR(255)  -- length-limited, digest suffix for long keys
//! cache_group VARCHAR(255)
//! cache_value TEXT          -- serialized payload
//! expiration  INTEGER       -- absolute Unix timestamp, 0 = never
//! PRIMARY KEY (cache_key, cache_group)
//! ```
//!
//! rusqlite is blocking, so every call opens its own connection inside
//! `spawn_blocking`. No connection or lock outlives a single operation.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::config::RelationalBackendConfig;
use super::entry::{is_expired, now_unix, CacheValue, StoredEntry};
use super::error::CacheError;
use super::key::{KeyEncoder, TableKeyEncoder};
use super::traits::StorageBackend;
use crate::constants::{BACKEND_RELATIONAL, DEFAULT_BUSY_TIMEOUT_MS, PRIMARY_TENANT_ID};

/// Physical table name for a tenant
///
/// The primary tenant uses `{prefix}{name}`, every other tenant gets
/// `{prefix}{tenant}_{name}`. Only ASCII letters, digits and underscores are
/// accepted since the name is interpolated into SQL.
pub fn table_name(prefix: &str, tenant_id: u64, name: &str) -> Result<String, CacheError> {
    let table = if tenant_id == PRIMARY_TENANT_ID {
        format!("{}{}", prefix, name)
    } else {
        format!("{}{}_{}", prefix, tenant_id, name)
    };

    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CacheError::Configuration(format!(
            "invalid table name '{}'",
            table
        )));
    }

    Ok(table)
}

pub struct RelationalBackend {
    database_path: PathBuf,
    table: Arc<str>,
    encoder: TableKeyEncoder,
    busy_timeout: Duration,
}

impl RelationalBackend {
    pub fn new(
        database_path: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let table = table.into();
        // Re-run the identifier check for names that bypassed table_name()
        table_name("", PRIMARY_TENANT_ID, &table)?;

        Ok(Self {
            database_path: database_path.into(),
            table: Arc::from(table),
            encoder: TableKeyEncoder::default(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        })
    }

    pub fn from_config(config: &RelationalBackendConfig, tenant_id: u64) -> Result<Self, CacheError> {
        let table = table_name(&config.table_prefix, tenant_id, &config.table_name)?;
        Self::new(&config.database_path, table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn encoder(&self) -> &TableKeyEncoder {
        &self.encoder
    }

    /// Run `op` against a fresh connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(&Connection, &str) -> Result<T, CacheError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.database_path.clone();
        let table = self.table.clone();
        let busy_timeout = self.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(busy_timeout)?;
            op(&conn, &table)
        })
        .await?
    }
}

#[async_trait]
impl StorageBackend for RelationalBackend {
    fn name(&self) -> &'static str {
        BACKEND_RELATIONAL
    }

    async fn activate(&self, _network_wide: bool) -> Result<(), CacheError> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        self.run(|conn, table| {
            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    cache_key VARCHAR(255) NOT NULL,
                    cache_group VARCHAR(255) NOT NULL DEFAULT '',
                    cache_value TEXT NOT NULL,
                    expiration INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (cache_key, cache_group)
                );
                "#,
                table = table
            ))?;
            Ok(())
        })
        .await?;

        tracing::info!(table = %self.table, database = %self.database_path.display(), "Cache table ready");
        Ok(())
    }

    async fn deactivate(&self, _network_wide: bool) -> Result<(), CacheError> {
        if !tokio::fs::try_exists(&self.database_path).await? {
            return Ok(());
        }

        self.run(|conn, table| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
            Ok(())
        })
        .await?;

        tracing::info!(table = %self.table, "Cache table dropped");
        Ok(())
    }

    async fn read(&self, key: &str, group: &str) -> Result<Option<StoredEntry>, CacheError> {
        let row = self.encoder.encode(key, group);

        let found = self
            .run(move |conn, table| {
                let found: Option<(String, i64)> = conn
                    .query_row(
                        &format!(
                            "SELECT cache_value, expiration FROM {} WHERE cache_key = ?1 AND cache_group = ?2",
                            table
                        ),
                        params![row.cache_key, row.cache_group],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()?;

                let (raw, expiration) = match found {
                    Some(found) => found,
                    None => return Ok(None),
                };

                let expires_at = expiration.max(0) as u64;
                if is_expired(expires_at, now_unix()) {
                    conn.execute(
                        &format!(
                            "DELETE FROM {} WHERE cache_key = ?1 AND cache_group = ?2",
                            table
                        ),
                        params![row.cache_key, row.cache_group],
                    )?;
                    return Ok(Some(Err(expires_at)));
                }

                Ok(Some(Ok((raw, expires_at))))
            })
            .await?;

        match found {
            None => Ok(None),
            Some(Err(expires_at)) => {
                tracing::debug!(key = %key, group = %group, expires_at, "Cache row expired");
                Ok(None)
            }
            Some(Ok((raw, expires_at))) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(StoredEntry::new(value, expires_at))),
                Err(err) => {
                    tracing::warn!(key = %key, group = %group, error = %err, "Ignoring corrupt cache row");
                    Ok(None)
                }
            },
        }
    }

    async fn write(
        &self,
        key: &str,
        value: &CacheValue,
        expires_at: u64,
        group: &str,
    ) -> Result<(), CacheError> {
        let row = self.encoder.encode(key, group);
        let payload = serde_json::to_string(value)?;
        let expiration = i64::try_from(expires_at).unwrap_or(i64::MAX);

        self.run(move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (cache_key, cache_group, cache_value, expiration) VALUES (?1, ?2, ?3, ?4)",
                    table
                ),
                params![row.cache_key, row.cache_group, payload, expiration],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(table = %self.table, key = %key, group = %group, "Cache row written");
        Ok(())
    }

    async fn delete(&self, key: &str, group: &str) -> Result<bool, CacheError> {
        let row = self.encoder.encode(key, group);

        self.run(move |conn, table| {
            let affected = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE cache_key = ?1 AND cache_group = ?2",
                    table
                ),
                params![row.cache_key, row.cache_group],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let removed = self
            .run(|conn, table| Ok(conn.execute(&format!("DELETE FROM {}", table), [])?))
            .await?;

        tracing::debug!(table = %self.table, removed, "Cache table truncated");
        Ok(())
    }
}
