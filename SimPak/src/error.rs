//! Error types for `SimPak`

use thiserror::Error;

/// The error type for `SimPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations or truncated reads.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Collection Errors ====================
    /// An entry already occupies the id that was about to be assigned.
    ///
    /// Ids come from a monotonic counter, so this indicates a broken internal
    /// invariant rather than bad input.
    #[error("duplicated id in mapped model: {id}")]
    DuplicateId {
        /// The id that was already taken.
        id: u32,
    },

    /// Two or more entries in a package share an identical resource key.
    #[error("package contains more than one entry with key {key}")]
    DuplicateKey {
        /// The repeated key, formatted as `type:group:instance`.
        key: String,
    },

    // ==================== Validation Errors ====================
    /// A key component does not fit in its bit width.
    #[error("key {field} out of range: {value}")]
    KeyRange {
        /// Which component of the key is invalid.
        field: &'static str,
        /// The offending value.
        value: u128,
    },

    /// A resource key string is not in `type:group:instance` hex form.
    #[error("invalid resource key: {0}")]
    InvalidResourceKey(String),

    /// A field value does not fit in the width it is written with.
    #[error("{field} out of range: {value} (max {max})")]
    ValueOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Largest value the field can hold.
        max: u64,
    },

    // ==================== Package Format Errors ====================
    /// The data is not a DBPF package (missing `DBPF` magic).
    #[error("invalid package magic: expected DBPF, found {0:?}")]
    InvalidPackageMagic([u8; 4]),

    /// The package declares a format version this library cannot read.
    #[error("unsupported package version: {major}.{minor} (supported: 2.0-2.1)")]
    UnsupportedFormatVersion {
        /// Major version found in the header.
        major: u32,
        /// Minor version found in the header.
        minor: u32,
    },

    /// The header or index table is inconsistent with the data.
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// A resource could not be decoded and recovery mode was off.
    #[error("failed to load resource {key}: {reason}")]
    ResourceDecodeFailed {
        /// The resource key, formatted as `type:group:instance`.
        key: String,
        /// Why decoding failed.
        reason: String,
    },

    // ==================== Resource Errors ====================
    /// The resource kind is kept as opaque bytes and cannot be re-serialized
    /// from a model.
    #[error("cannot serialize a {variant} resource")]
    SerializationUnsupported {
        /// The resource variant name.
        variant: String,
    },

    /// The data is not a string table (missing `STBL` magic).
    #[error("invalid string table magic: expected STBL, found {0:?}")]
    InvalidStringTableMagic([u8; 4]),

    /// The string table declares a version this library cannot read.
    #[error("unsupported string table version: {version} (supported: 5)")]
    UnsupportedStringTableVersion {
        /// The version number found in the data.
        version: u16,
    },

    // ==================== Compression/Decompression Errors ====================
    /// Unsupported compression code in an index record.
    #[error("unsupported compression type: {code:#06X}")]
    UnsupportedCompression {
        /// The compression code from the index record.
        code: u16,
    },

    /// Zlib decompression failed.
    #[error("Zlib decompression failed: {message}")]
    ZlibDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// Internal (`RefPack`) decompression failed.
    #[error("internal decompression failed: {message}")]
    RefPackDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// Decompressed data does not have the size declared by its index record.
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressedSizeMismatch {
        /// Size declared by the index record.
        expected: usize,
        /// Size actually produced.
        actual: usize,
    },

    // ==================== Parsing Errors ====================
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// A specialized Result type for `SimPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
