//! File tree storage backend
//!
//! One file per entry under a shared cache root:
//!
//! ```text
//! {cache_dir}/{tenant:06}/{d[0]}/{d[1..4]}/{d[4..7]}/{d[7..]}.php
//! ```
//!
//! where `d` is the hex MD5 of `key + "/" + group`. Every read or write is a
//! self-contained open/read/close; writes go through a temp file and a rename
//! so concurrent readers never observe a partial entry.

pub mod format;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::io;
use std::path::{Path, PathBuf};

use super::config::FileBackendConfig;
use super::entry::{is_expired, now_unix, CacheValue, StoredEntry};
use super::error::CacheError;
use super::key::{FileKeyEncoder, KeyEncoder};
use super::traits::StorageBackend;
use crate::constants::BACKEND_FILE;

pub struct FileBackend {
    root: PathBuf,
    encoder: FileKeyEncoder,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>, tenant_id: u64) -> Self {
        Self {
            root: root.into(),
            encoder: FileKeyEncoder::new(tenant_id),
        }
    }

    pub fn from_config(config: &FileBackendConfig, tenant_id: u64) -> Self {
        Self::new(&config.cache_dir, tenant_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the file holding `(key, group)`
    pub fn path_for(&self, key: &str, group: &str) -> PathBuf {
        self.root.join(self.encoder.encode(key, group).relative_path())
    }

    async fn root_exists(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn remove_entry_file(&self, path: &Path) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        BACKEND_FILE
    }

    async fn activate(&self, _network_wide: bool) -> Result<(), CacheError> {
        // Entries left behind by an earlier activation may be stale
        if self.root_exists().await {
            purge_dir(self.root.clone()).await?;
        }
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::info!(cache_dir = %self.root.display(), "File cache directory ready");
        Ok(())
    }

    async fn deactivate(&self, _network_wide: bool) -> Result<(), CacheError> {
        if !self.root_exists().await {
            return Ok(());
        }
        purge_dir(self.root.clone()).await?;
        match tokio::fs::remove_dir(&self.root).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tracing::info!(cache_dir = %self.root.display(), "File cache directory removed");
        Ok(())
    }

    async fn read(&self, key: &str, group: &str) -> Result<Option<StoredEntry>, CacheError> {
        let path = self.path_for(key, group);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let expires_at = match format::decode_expires(&data) {
            Ok(expires_at) => expires_at,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring corrupt cache file");
                return Ok(None);
            }
        };

        if is_expired(expires_at, now_unix()) {
            tracing::debug!(path = %path.display(), expires_at, "Cache file expired");
            self.remove_entry_file(&path).await?;
            return Ok(None);
        }

        match format::decode_payload(&data) {
            Ok(value) => Ok(Some(StoredEntry::new(value, expires_at))),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring corrupt cache file");
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
        let path = self.path_for(key, group);
        let data = format::encode_entry(value, expires_at)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(&path);
        if let Err(err) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        tracing::debug!(path = %path.display(), bytes = data.len(), "Cache file written");
        Ok(())
    }

    async fn delete(&self, key: &str, group: &str) -> Result<bool, CacheError> {
        self.remove_entry_file(&self.path_for(key, group)).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        if !self.root_exists().await {
            return Err(CacheError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("cache directory {} does not exist", self.root.display()),
            )));
        }
        purge_dir(self.root.clone()).await?;
        Ok(())
    }

    fn miss_consults_fallback(&self) -> bool {
        true
    }
}

/// Unique sibling path used while a write is in flight
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

/// Remove everything below `dir`, keeping `dir` itself
///
/// Subdirectories are removed once their own contents are gone. Entries that
/// vanish concurrently are skipped.
fn purge_dir(dir: PathBuf) -> BoxFuture<'static, Result<(), CacheError>> {
    async move {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            let removed = if file_type.is_dir() {
                purge_dir(path.clone()).await?;
                tokio::fs::remove_dir(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match removed {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> FileBackend {
        FileBackend::new(dir.path().join("cache"), 1)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.activate(false).await.unwrap();

        backend.write("k", &json!({"a": 1}), 0, "g").await.unwrap();
        let entry = backend.read("k", "g").await.unwrap().unwrap();
        assert_eq!(entry.value, json!({"a": 1}));
        assert_eq!(entry.expires_at, 0);
    }

    #[tokio::test]
    async fn test_path_layout_uses_tenant_and_digest_segments() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path(), 12);
        let path = backend.path_for("k", "g");
        let relative = path.strip_prefix(dir.path()).unwrap();

        let parts: Vec<_> = relative.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "000012");
        assert_eq!(parts[1].len(), 1);
        assert_eq!(parts[2].len(), 3);
        assert_eq!(parts[3].len(), 3);
        assert!(parts[4].ends_with(".php"));
        assert_eq!(parts[4].len(), 25 + 4);
    }

    #[tokio::test]
    async fn test_write_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        backend.write("k", &json!(1), 0, "g").await.unwrap();
        assert!(backend.path_for("k", "g").is_file());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.write("k", &json!("v"), 0, "g").await.unwrap();

        let parent = backend.path_for("k", "g").parent().unwrap().to_path_buf();
        let names: Vec<_> = std::fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_deleted_on_read() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.write("k", &json!(1), 1, "g").await.unwrap();

        assert_eq!(backend.read("k", "g").await.unwrap(), None);
        assert!(!backend.path_for("k", "g").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_miss() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.write("k", &json!(1), 0, "g").await.unwrap();
        std::fs::write(backend.path_for("k", "g"), b"xy").unwrap();

        assert_eq!(backend.read("k", "g").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_file_existed() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.write("k", &json!(1), 0, "g").await.unwrap();

        assert!(backend.delete("k", "g").await.unwrap());
        assert!(!backend.delete("k", "g").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_keeps_root_and_removes_subdirectories() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.activate(false).await.unwrap();
        for i in 0..20 {
            backend
                .write(&format!("key-{}", i), &json!(i), 0, "g")
                .await
                .unwrap();
        }

        backend.clear().await.unwrap();
        assert!(backend.root().is_dir());
        assert_eq!(std::fs::read_dir(backend.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clear_without_root_fails() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        assert!(matches!(backend.clear().await, Err(CacheError::Io(_))));
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.activate(false).await.unwrap();
        backend.activate(false).await.unwrap();

        backend.write("k", &json!(1), 0, "g").await.unwrap();
        assert!(backend.read("k", "g").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deactivate_removes_root() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.activate(false).await.unwrap();
        backend.write("k", &json!(1), 0, "g").await.unwrap();

        backend.deactivate(false).await.unwrap();
        assert!(!backend.root().exists());
        // Second call is a no-op
        backend.deactivate(false).await.unwrap();
    }
}
