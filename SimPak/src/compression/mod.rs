//! Compression utilities for package payloads

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{Error, Result};
use crate::package::CompressionType;

pub mod refpack;

/// Compress a payload with the given compression type
///
/// Types that cannot be written (streamable, deleted) fall back to ZLIB; use
/// [`CompressionType::for_writing`] to learn which type was actually used.
///
/// # Errors
/// Returns an error if compression fails.
pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression.for_writing() {
        CompressionType::Uncompressed => Ok(data.to_vec()),
        CompressionType::InternalCompression => Ok(refpack::compress(data)),
        _ => compress_zlib(data),
    }
}

/// Decompress a payload and check it against its declared size
///
/// # Errors
/// Returns an error if the compression type is not readable, decompression
/// fails, or the result is not `mem_size` bytes long.
pub fn decompress(data: &[u8], compression: CompressionType, mem_size: usize) -> Result<Vec<u8>> {
    let decompressed = match compression {
        CompressionType::Uncompressed | CompressionType::DeletedRecord => data.to_vec(),
        CompressionType::Zlib => decompress_zlib(data, mem_size)?,
        CompressionType::InternalCompression => refpack::decompress(data)?,
        CompressionType::Streamable => {
            return Err(Error::UnsupportedCompression {
                code: compression.code(),
            });
        }
    };

    if compression != CompressionType::DeletedRecord && decompressed.len() != mem_size {
        return Err(Error::DecompressedSizeMismatch {
            expected: mem_size,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}

/// Compress data using ZLIB
///
/// # Errors
/// Returns an error if compression fails.
pub fn compress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress ZLIB data
///
/// # Errors
/// Returns an error if decompression fails.
pub fn decompress_zlib(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::ZlibDecompressionFailed {
            message: e.to_string(),
        })?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"<?xml version=\"1.0\"?><I n=\"trait\"><T n=\"value\">50</T></I>";

    #[test]
    fn test_zlib_payload() {
        let compressed = compress(TEXT, CompressionType::Zlib).unwrap();
        assert_ne!(compressed, TEXT);
        let decompressed = decompress(&compressed, CompressionType::Zlib, TEXT.len()).unwrap();
        assert_eq!(decompressed, TEXT);
    }

    #[test]
    fn test_uncompressed_is_verbatim() {
        let stored = compress(TEXT, CompressionType::Uncompressed).unwrap();
        assert_eq!(stored, TEXT);
    }

    #[test]
    fn test_internal_payload() {
        let compressed = compress(TEXT, CompressionType::InternalCompression).unwrap();
        let decompressed =
            decompress(&compressed, CompressionType::InternalCompression, TEXT.len()).unwrap();
        assert_eq!(decompressed, TEXT);
    }

    #[test]
    fn test_unwritable_types_fall_back_to_zlib() {
        let compressed = compress(TEXT, CompressionType::DeletedRecord).unwrap();
        assert_eq!(
            decompress(&compressed, CompressionType::Zlib, TEXT.len()).unwrap(),
            TEXT
        );
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let compressed = compress(TEXT, CompressionType::Zlib).unwrap();
        let err = decompress(&compressed, CompressionType::Zlib, TEXT.len() + 1).unwrap_err();
        assert!(matches!(err, Error::DecompressedSizeMismatch { .. }));
    }

    #[test]
    fn test_streamable_is_rejected() {
        let err = decompress(TEXT, CompressionType::Streamable, TEXT.len()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression { code: 0xFFFE }));
    }

    #[test]
    fn test_corrupt_zlib() {
        let err = decompress(b"not zlib at all", CompressionType::Zlib, 10).unwrap_err();
        assert!(matches!(err, Error::ZlibDecompressionFailed { .. }));
    }
}
