//! Types for DBPF package handling

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The `type:group:instance` address of a resource within a package.
///
/// Equality, ordering and hashing are by value over all three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource type id
    #[serde(rename = "type")]
    pub resource_type: u32,
    /// Group id
    pub group: u32,
    /// Instance id
    pub instance: u64,
}

impl ResourceKey {
    /// Creates a key from its components.
    #[must_use]
    pub const fn new(resource_type: u32, group: u32, instance: u64) -> Self {
        Self {
            resource_type,
            group,
            instance,
        }
    }

    /// Creates a key from wider integers, rejecting components that do not fit
    /// in their bit width.
    pub fn try_new(resource_type: u128, group: u128, instance: u128) -> Result<Self> {
        let resource_type = u32::try_from(resource_type).map_err(|_| Error::KeyRange {
            field: "type",
            value: resource_type,
        })?;
        let group = u32::try_from(group).map_err(|_| Error::KeyRange {
            field: "group",
            value: group,
        })?;
        let instance = u64::try_from(instance).map_err(|_| Error::KeyRange {
            field: "instance",
            value: instance,
        })?;
        Ok(Self::new(resource_type, group, instance))
    }

    /// Checks that every component fits in its bit width.
    ///
    /// The components are typed to their widths, so a constructed key is
    /// always valid; this exists so entries can validate uniformly.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Upper 32 bits of the instance, as stored in index records.
    #[must_use]
    pub fn instance_high(&self) -> u32 {
        (self.instance >> 32) as u32
    }

    /// Lower 32 bits of the instance, as stored in index records.
    #[must_use]
    pub fn instance_low(&self) -> u32 {
        (self.instance & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}:{:08X}:{:016X}",
            self.resource_type, self.group, self.instance
        )
    }
}

impl FromStr for ResourceKey {
    type Err = Error;

    /// Parses `type:group:instance` with hexadecimal components. Separators
    /// may be `:`, `!` or `-`, and components may carry a `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split([':', '!', '-']).collect();
        let [resource_type, group, instance] = parts.as_slice() else {
            return Err(Error::InvalidResourceKey(format!(
                "expected type:group:instance, found {s:?}"
            )));
        };

        let parse = |part: &str| -> Result<u128> {
            let digits = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part);
            u128::from_str_radix(digits, 16)
                .map_err(|e| Error::InvalidResourceKey(format!("component {part:?}: {e}")))
        };

        Self::try_new(parse(resource_type)?, parse(group)?, parse(instance)?)
    }
}

/// Compression applied to one resource's payload in a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionType {
    /// Stored as-is
    Uncompressed,
    /// ZLIB stream
    #[default]
    Zlib,
    /// The game's internal (`RefPack`) compression
    InternalCompression,
    /// Legacy streamable compression, read-only
    Streamable,
    /// Marker for a record that has been deleted
    DeletedRecord,
}

impl CompressionType {
    /// Parse a compression type from an index record code
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0x0000 => Ok(Self::Uncompressed),
            0x5A42 => Ok(Self::Zlib),
            0xFFFF => Ok(Self::InternalCompression),
            0xFFFE => Ok(Self::Streamable),
            0xFFE0 => Ok(Self::DeletedRecord),
            _ => Err(Error::UnsupportedCompression { code }),
        }
    }

    /// Convert to the code written in index records
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Uncompressed => 0x0000,
            Self::Zlib => 0x5A42,
            Self::InternalCompression => 0xFFFF,
            Self::Streamable => 0xFFFE,
            Self::DeletedRecord => 0xFFE0,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Zlib => "zlib",
            Self::InternalCompression => "internal",
            Self::Streamable => "streamable",
            Self::DeletedRecord => "deleted",
        }
    }

    /// The type to use when a changed payload is recompressed. Types that
    /// cannot be written fall back to ZLIB.
    #[must_use]
    pub fn for_writing(self) -> Self {
        match self {
            Self::Streamable | Self::DeletedRecord => Self::Zlib,
            other => other,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a DBPF package
#[derive(Debug, Clone, Default)]
pub(crate) struct PackageHeader {
    /// Major format version (2 for The Sims 4)
    pub major_version: u32,
    /// Minor format version
    pub minor_version: u32,
    /// Number of records in the index
    pub index_count: u32,
    /// Size of the index in bytes
    pub index_size: u32,
    /// Absolute offset of the index
    pub index_offset: u64,
}

/// One record of a package's index table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Key of the resource
    pub key: ResourceKey,
    /// Absolute offset of the payload
    pub offset: u32,
    /// Size of the payload as stored
    pub file_size: u32,
    /// Size of the payload once decompressed
    pub mem_size: u32,
    /// How the payload is compressed
    pub compression: CompressionType,
    /// Committed flag (1 in packages written by the game)
    pub committed: u16,
}

/// Progress information during package operations
#[derive(Debug, Clone)]
pub struct PackageProgress {
    /// Current operation phase
    pub phase: PackagePhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Key of the resource being processed (if applicable)
    pub current_key: Option<ResourceKey>,
}

impl PackageProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: PackagePhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_key: None,
        }
    }

    /// Create a progress update for a specific resource
    #[must_use]
    pub fn with_key(phase: PackagePhase, current: usize, total: usize, key: ResourceKey) -> Self {
        Self {
            phase,
            current,
            total,
            current_key: Some(key),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of a package operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagePhase {
    /// Reading the package header
    ReadingHeader,
    /// Reading the index table
    ReadingIndex,
    /// Decompressing and decoding resources
    LoadingResources,
    /// Serializing and compressing resources
    CompressingResources,
    /// Writing the index table
    WritingIndex,
    /// Operation complete
    Complete,
}

impl PackagePhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingHeader => "Reading header",
            Self::ReadingIndex => "Reading index",
            Self::LoadingResources => "Loading resources",
            Self::CompressingResources => "Compressing resources",
            Self::WritingIndex => "Writing index",
            Self::Complete => "Complete",
        }
    }
}

/// Progress callback type
pub type ProgressCallback<'a> = &'a dyn Fn(&PackageProgress);
