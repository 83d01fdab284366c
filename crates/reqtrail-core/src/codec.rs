//! On-disk encoding of captured payloads
//!
//! Payloads are serialized as JSON and, when compression is enabled, wrapped
//! in a zlib stream. Decoding accepts both forms: a zlib stream always starts
//! with `0x78`, which no JSON document can start with.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value as JsonValue;

use crate::error::{Result, TrailError};

const ZLIB_MAGIC: u8 = 0x78;

/// Encode a payload for storage
pub fn encode_payload(value: &JsonValue, compress: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    if !compress {
        return Ok(json);
    }

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    encoder
        .finish()
        .map_err(|e| TrailError::codec(format!("Failed to compress payload: {}", e)))
}

/// Decode a stored payload, compressed or not
pub fn decode_payload(bytes: &[u8]) -> Result<JsonValue> {
    if bytes.first() == Some(&ZLIB_MAGIC) {
        let mut json = Vec::new();
        ZlibDecoder::new(bytes)
            .read_to_end(&mut json)
            .map_err(|e| TrailError::codec(format!("Failed to decompress payload: {}", e)))?;
        return Ok(serde_json::from_slice(&json)?);
    }

    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compressed_payload_is_zlib() {
        let bytes = encode_payload(&json!({"id": "5"}), true).unwrap();
        assert_eq!(bytes[0], ZLIB_MAGIC);
        assert_eq!(decode_payload(&bytes).unwrap(), json!({"id": "5"}));
    }

    #[test]
    fn test_plain_payload_is_json_text() {
        let bytes = encode_payload(&json!(["a", "b"]), false).unwrap();
        assert_eq!(bytes, br#"["a","b"]"#);
        assert_eq!(decode_payload(&bytes).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_compression_shrinks_repetitive_payloads() {
        let big = json!({"blob": "x".repeat(4096)});
        let plain = encode_payload(&big, false).unwrap();
        let packed = encode_payload(&big, true).unwrap();
        assert!(packed.len() < plain.len() / 4);
    }

    #[test]
    fn test_corrupt_stream_is_an_error() {
        assert!(decode_payload(&[ZLIB_MAGIC, 0x9c, 0x00, 0x01]).is_err());
        assert!(decode_payload(b"{not json").is_err());
    }
}
