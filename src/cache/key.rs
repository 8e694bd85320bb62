//! Key encoding for the storage backends
//!
//! Each backend maps a `(key, group)` pair to its own kind of identifier:
//! - file tree: a digest split into a bounded-fan-out directory path
//! - relational table: the raw key, length-limited with a digest suffix
//! - memcached: a namespace prefix followed by a digest
//!
//! All of them go through the `KeyEncoder` trait so a new backend only adds
//! an encoder, never touches callers.

use md5::{Digest, Md5};
use std::path::PathBuf;

use crate::constants::{FILE_EXTENSION, MAX_TABLE_KEY_LENGTH};

/// Maps a `(key, group)` pair to a backend-specific identifier
pub trait KeyEncoder {
    type Encoded;

    fn encode(&self, key: &str, group: &str) -> Self::Encoded;
}

/// Lowercase hex MD5 digest (32 chars)
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Location of a cache file relative to the cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    /// `{tenant:06}/{d[0]}/{d[1..4]}/{d[4..7]}`
    pub directory: PathBuf,
    /// `{d[7..]}.php`
    pub file_name: String,
}

impl FileLocation {
    pub fn relative_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Encoder for the file backend, scoped to one tenant
#[derive(Debug, Clone, Copy)]
pub struct FileKeyEncoder {
    tenant_id: u64,
}

impl FileKeyEncoder {
    pub fn new(tenant_id: u64) -> Self {
        Self { tenant_id }
    }

    /// Zero-padded tenant directory name (tenant 1 -> "000001")
    pub fn tenant_directory(&self) -> String {
        format!("{:06}", self.tenant_id)
    }
}

impl KeyEncoder for FileKeyEncoder {
    type Encoded = FileLocation;

    fn encode(&self, key: &str, group: &str) -> FileLocation {
        let digest = md5_hex(&format!("{}/{}", key, group));

        let directory = PathBuf::from(self.tenant_directory())
            .join(&digest[0..1])
            .join(&digest[1..4])
            .join(&digest[4..7]);

        FileLocation {
            directory,
            file_name: format!("{}.{}", &digest[7..], FILE_EXTENSION),
        }
    }
}

/// Row identity in the relational table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKey {
    pub cache_key: String,
    pub cache_group: String,
}

/// Encoder for the relational backend
#[derive(Debug, Clone, Copy)]
pub struct TableKeyEncoder {
    max_len: usize,
}

impl Default for TableKeyEncoder {
    fn default() -> Self {
        Self::new(MAX_TABLE_KEY_LENGTH)
    }
}

impl TableKeyEncoder {
    /// `max_len` must leave room for the 32-char digest suffix
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(DIGEST_LEN + 1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Keep keys within the column limit
    ///
    /// Keys over the limit keep their first `max_len - 32` bytes and replace
    /// the rest with its MD5 digest, so two long keys sharing a prefix still
    /// map to different rows. The cut never splits a UTF-8 character; when it
    /// has to move back, the digest is zero-padded so the result is always
    /// exactly `max_len` bytes.
    pub fn limit(&self, key: &str) -> String {
        if key.len() <= self.max_len {
            return key.to_string();
        }

        let mut split = self.max_len - DIGEST_LEN;
        while !key.is_char_boundary(split) {
            split -= 1;
        }

        format!(
            "{}{:0>width$}",
            &key[..split],
            md5_hex(&key[split..]),
            width = self.max_len - split
        )
    }
}

const DIGEST_LEN: usize = 32;

impl KeyEncoder for TableKeyEncoder {
    type Encoded = TableKey;

    fn encode(&self, key: &str, group: &str) -> TableKey {
        TableKey {
            cache_key: self.limit(key),
            cache_group: group.to_string(),
        }
    }
}

/// Encoder for the memcached backend
#[derive(Debug, Clone)]
pub struct NamespacedKeyEncoder {
    namespace: String,
}

impl NamespacedKeyEncoder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether a server-side key was written through this encoder
    pub fn owns(&self, raw_key: &str) -> bool {
        raw_key.starts_with(&self.namespace)
    }
}

impl KeyEncoder for NamespacedKeyEncoder {
    type Encoded = String;

    fn encode(&self, key: &str, group: &str) -> String {
        format!("{}{}", self.namespace, md5_hex(&format!("{}_{}", key, group)))
    }
}
