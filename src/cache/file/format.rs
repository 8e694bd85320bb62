//! On-disk entry layout
//!
//! ```text
//! bytes[0..4)   expires_at, u32, native byte order (0 = never)
//! bytes[4..20)  guard header "\n<?php exit; ?>\n"
//! bytes[20..)   serialized payload
//! ```
//!
//! The guard keeps a web server that executes files under the cache root from
//! ever emitting the payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::cache::entry::CacheValue;
use crate::cache::error::CacheError;
use crate::constants::{FILE_EXPIRY_LEN, FILE_GUARD, FILE_HEADER_LEN};

/// Encode an entry into its on-disk form
pub fn encode_entry(value: &CacheValue, expires_at: u64) -> Result<Bytes, CacheError> {
    let payload = serde_json::to_vec(value)?;
    // Timestamps past 2106 saturate rather than wrap
    let expires_at = u32::try_from(expires_at).unwrap_or(u32::MAX);

    let mut buf = BytesMut::with_capacity(FILE_HEADER_LEN + payload.len());
    buf.put_slice(&expires_at.to_ne_bytes());
    buf.put_slice(FILE_GUARD);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Read the expiry prefix
pub fn decode_expires(data: &[u8]) -> Result<u64, CacheError> {
    let prefix: [u8; FILE_EXPIRY_LEN] = data
        .get(..FILE_EXPIRY_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| CacheError::CorruptEntry("missing expiry header".to_string()))?;
    Ok(u32::from_ne_bytes(prefix) as u64)
}

/// Deserialize the payload that follows the header
pub fn decode_payload(data: &[u8]) -> Result<CacheValue, CacheError> {
    let payload = data
        .get(FILE_HEADER_LEN..)
        .ok_or_else(|| CacheError::CorruptEntry("truncated header".to_string()))?;
    serde_json::from_slice(payload)
        .map_err(|err| CacheError::CorruptEntry(format!("undecodable payload: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_matches_header_offsets() {
        let data = encode_entry(&json!("v"), 1_700_000_000).unwrap();

        assert_eq!(&data[..4], &1_700_000_000u32.to_ne_bytes());
        assert_eq!(&data[4..20], b"\n<?php exit; ?>\n");
        assert_eq!(&data[20..], b"\"v\"");
    }

    #[test]
    fn test_decode_reads_back_expiry_and_payload() {
        let data = encode_entry(&json!({"a": [1, 2]}), 42).unwrap();
        assert_eq!(decode_expires(&data).unwrap(), 42);
        assert_eq!(decode_payload(&data).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_oversized_expiry_saturates() {
        let data = encode_entry(&json!(1), u64::MAX).unwrap();
        assert_eq!(decode_expires(&data).unwrap(), u32::MAX as u64);
    }

    #[test]
    fn test_short_file_is_corrupt() {
        assert!(matches!(decode_expires(b"ab"), Err(CacheError::CorruptEntry(_))));
        assert!(matches!(
            decode_payload(b"abcd\n<?php"),
            Err(CacheError::CorruptEntry(_))
        ));
    }

    #[test]
    fn test_garbage_payload_is_corrupt() {
        let mut data = encode_entry(&json!(1), 0).unwrap().to_vec();
        data.truncate(FILE_HEADER_LEN);
        data.extend_from_slice(b"{not json");
        assert!(matches!(decode_payload(&data), Err(CacheError::CorruptEntry(_))));
    }
}
