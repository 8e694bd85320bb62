//! Minimal memcached text protocol client
//!
//! Covers only what the backend needs: `get`, `set`, `delete` and key
//! enumeration through `lru_crawler metadump all`. One client owns one
//! buffered TCP connection.
//!
//! Every exchange marks the client busy until its reply has been read in
//! full. A client left busy (the caller's future was dropped mid-exchange, or
//! the exchange failed partway) may have an unread reply on the wire and
//! refuses further commands; the owner must reconnect.

use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::cache::error::CacheError;

/// Longest key the server accepts
pub const MAX_KEY_LENGTH: usize = 250;

pub struct MemcachedClient {
    stream: BufStream<TcpStream>,
    in_flight: bool,
}

impl MemcachedClient {
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, CacheError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| CacheError::Memcached(format!("connection to {} timed out", address)))??;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream: BufStream::new(stream),
            in_flight: false,
        })
    }

    /// False once an exchange was interrupted; the connection must be replaced
    pub fn is_in_sync(&self) -> bool {
        !self.in_flight
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>, CacheError> {
        validate_key(key)?;
        self.send(format!("get {}\r\n", key).as_bytes()).await?;

        let mut value = None;
        loop {
            let line = self.read_line().await?;
            if line == "END" {
                self.in_flight = false;
                return Ok(value);
            }

            // VALUE <key> <flags> <bytes>
            let mut parts = line.split_whitespace();
            let len = match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some("VALUE"), Some(reply_key), Some(_), Some(len)) => {
                    if reply_key != key {
                        return Err(CacheError::Memcached(format!(
                            "reply for '{}' while reading '{}'",
                            reply_key, key
                        )));
                    }
                    len.parse::<usize>().map_err(|_| {
                        CacheError::Memcached(format!("bad value header: {}", line))
                    })?
                }
                _ => return Err(CacheError::Memcached(format!("unexpected reply: {}", line))),
            };

            let mut data = vec![0u8; len + 2];
            self.stream.read_exact(&mut data).await?;
            if !data.ends_with(b"\r\n") {
                return Err(CacheError::Memcached("value block not terminated".to_string()));
            }
            data.truncate(len);
            value = Some(Bytes::from(data));
        }
    }

    /// Store `data` under `key`; `exptime` is passed through unchanged
    pub async fn set(&mut self, key: &str, data: &[u8], exptime: u64) -> Result<bool, CacheError> {
        validate_key(key)?;

        let mut command = format!("set {} 0 {} {}\r\n", key, exptime, data.len()).into_bytes();
        command.extend_from_slice(data);
        command.extend_from_slice(b"\r\n");
        self.send(&command).await?;

        let stored = match self.read_line().await?.as_str() {
            "STORED" => true,
            "NOT_STORED" => false,
            other => return Err(CacheError::Memcached(format!("unexpected reply: {}", other))),
        };
        self.in_flight = false;
        Ok(stored)
    }

    pub async fn delete(&mut self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.send(format!("delete {}\r\n", key).as_bytes()).await?;

        let deleted = match self.read_line().await?.as_str() {
            "DELETED" => true,
            "NOT_FOUND" => false,
            other => return Err(CacheError::Memcached(format!("unexpected reply: {}", other))),
        };
        self.in_flight = false;
        Ok(deleted)
    }

    /// Every key currently held by the server
    pub async fn keys(&mut self) -> Result<Vec<String>, CacheError> {
        self.send(b"lru_crawler metadump all\r\n").await?;

        let mut keys = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "END" {
                self.in_flight = false;
                return Ok(keys);
            }
            if line.starts_with("BUSY") {
                return Err(CacheError::Memcached(line));
            }

            // key=<urlencoded> exp=... la=... cas=... fetch=... cls=... size=...
            let encoded = line
                .split_whitespace()
                .find_map(|field| field.strip_prefix("key="));
            if let Some(encoded) = encoded {
                let key = urlencoding::decode(encoded)
                    .map_err(|err| CacheError::Memcached(format!("bad key in metadump: {}", err)))?;
                keys.push(key.into_owned());
            }
        }
    }

    /// Start an exchange; the busy mark is only cleared once its reply is consumed
    async fn send(&mut self, command: &[u8]) -> Result<(), CacheError> {
        if self.in_flight {
            return Err(CacheError::Memcached(
                "connection out of sync after an interrupted request".to_string(),
            ));
        }
        self.in_flight = true;
        self.stream.write_all(command).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Next reply line without its terminator; server error replies become `Err`
    async fn read_line(&mut self) -> Result<String, CacheError> {
        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(CacheError::Memcached("connection closed by server".to_string()));
        }

        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if line == "ERROR" || line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR") {
            return Err(CacheError::Memcached(line));
        }
        Ok(line)
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty()
        || key.len() > MAX_KEY_LENGTH
        || key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
    {
        return Err(CacheError::Memcached(format!("invalid key '{}'", key)));
    }
    Ok(())
}
