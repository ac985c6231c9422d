//! Compression support for array payloads.
//!
//! FBX arrays with a non-zero encoding flag carry a zlib stream. The reader
//! always knows the exact inflated size from the array header, so
//! decompression is bounded up front and verified afterwards.

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Inflate a zlib stream to exactly `expected_len` bytes.
///
/// Never allocates more than `expected_len + 1` bytes: a stream that keeps
/// producing output past the declared length is reported as a mismatch
/// instead of being drained.
pub fn inflate(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::with_capacity(expected_len);
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Inflate(e.to_string()))?;

    if out.len() != expected_len {
        return Err(Error::InflatedLengthMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Compress data into a zlib stream.
///
/// The document writer never calls this (arrays are stored uncompressed);
/// it exists for producing compressed fixtures and external tooling.
///
/// # Arguments
/// * `data` - Data to compress
/// * `level` - Compression level (1-9, clamped)
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_inflate() {
        let original = b"Vertices Vertices Vertices PolygonVertexIndex ".repeat(100);

        let compressed = deflate(&original, 6).unwrap();
        assert!(compressed.len() < original.len());

        let inflated = inflate(&compressed, original.len()).unwrap();
        assert_eq!(inflated, original);
    }

    #[test]
    fn test_inflate_short_output() {
        let compressed = deflate(&[1u8; 64], 6).unwrap();
        let err = inflate(&compressed, 128).unwrap_err();
        assert!(matches!(
            err,
            Error::InflatedLengthMismatch { expected: 128, actual: 64 }
        ));
    }

    #[test]
    fn test_inflate_long_output_is_bounded() {
        let compressed = deflate(&[7u8; 4096], 9).unwrap();
        let err = inflate(&compressed, 16).unwrap_err();
        assert!(matches!(
            err,
            Error::InflatedLengthMismatch { expected: 16, actual: 17 }
        ));
    }

    #[test]
    fn test_inflate_garbage() {
        let err = inflate(b"definitely not zlib", 8).unwrap_err();
        assert!(matches!(err, Error::Inflate(_)));
    }
}
