//! DBPF package container
//!
//! A [`Package`] is a [`MappedModel`] of [`ResourceEntry`]s keyed by
//! [`ResourceKey`]. Reading keeps the original bytes at every level, so
//! serializing an untouched package (or an untouched entry within a changed
//! one) reuses them instead of recompressing.
//!
//! # Example
//!
//! ```
//! use simpak::prelude::*;
//!
//! let mut package = Package::create();
//! let key = ResourceKey::new(0x03B33DDF, 0, 0x1234);
//! package.add(key, Box::new(XmlResource::create("<I n=\"example\"/>")))?;
//!
//! let bytes = package.serialize()?;
//! let read = Package::from_bytes(&bytes, &PackageReadOptions::default())?;
//! assert_eq!(read.len(), 1);
//! assert!(read.get_by_key(&key).is_some());
//! # Ok::<(), simpak::Error>(())
//! ```

mod entry;
mod options;
mod reader;
mod types;
mod writer;

use std::future::{Ready, ready};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::debug;

pub use entry::{CompressedBuffer, ResourceEntry, ValueMut};
pub use options::{PackageReadOptions, ResourceFilter};
pub(crate) use types::PackageHeader;
pub use types::{
    CompressionType, IndexRecord, PackagePhase, PackageProgress, ProgressCallback, ResourceKey,
};

use crate::base::{Bytes, CacheCell, MappedModel, WritableModel};
use crate::error::{Error, Result};
use crate::resources::Resource;
use reader::PackageReader;

/// DBPF magic bytes
pub const MAGIC: [u8; 4] = *b"DBPF";

/// Major format version of Sims 4 packages
pub const MAJOR_VERSION: u32 = 2;

/// Highest minor version read, and the one written
pub const MAX_MINOR_VERSION: u32 = 1;

/// Index table minor version written in the header
pub const INDEX_MINOR_VERSION: u32 = 3;

/// Size of the package header
pub const HEADER_SIZE: usize = 96;

/// Index flag: every record shares one resource type
pub const INDEX_FLAG_CONSTANT_TYPE: u32 = 0x1;

/// Index flag: every record shares one group
pub const INDEX_FLAG_CONSTANT_GROUP: u32 = 0x2;

/// Index flag: every record shares the upper half of its instance
pub const INDEX_FLAG_CONSTANT_INSTANCE_HIGH: u32 = 0x4;

/// Progress callback that ignores every update
pub(crate) fn no_progress(_: &PackageProgress) {}

/// A Sims 4 package: a collection of resources addressed by key.
///
/// Derefs to its [`MappedModel`], which provides `add`, `delete`, `get`,
/// `get_by_key`, `get_mut` and the other collection operations.
#[derive(Debug, Default, Clone)]
pub struct Package {
    model: MappedModel<ResourceEntry>,
}

impl Package {
    /// Creates an empty package.
    #[must_use]
    pub fn create() -> Self {
        Self::default()
    }

    /// Creates a package holding `entries`, with ids assigned in order.
    #[must_use]
    pub fn with_entries(entries: Vec<(ResourceKey, Box<dyn Resource>)>) -> Self {
        Self {
            model: MappedModel::from_pairs(entries),
        }
    }

    /// Reads a package from its bytes.
    ///
    /// # Errors
    ///
    /// Fails on a malformed header or index table. Fails on an entry that
    /// cannot be decompressed or decoded unless
    /// [`PackageReadOptions::recovery_mode`] is set.
    pub fn from_bytes(data: &[u8], options: &PackageReadOptions) -> Result<Self> {
        Self::from_bytes_with_progress(data, options, &no_progress)
    }

    /// Reads a package from its bytes, reporting progress per entry.
    pub fn from_bytes_with_progress(
        data: &[u8],
        options: &PackageReadOptions,
        progress: ProgressCallback,
    ) -> Result<Self> {
        let loaded = PackageReader::new(data).read_entries(options, progress)?;

        // The input bytes only describe the package if nothing was skipped
        let cache = if options.save_buffer && loaded.complete {
            CacheCell::with_value(Bytes::from(data))
        } else {
            CacheCell::new()
        };

        Ok(Self {
            model: MappedModel::from_entries(loaded.entries, cache),
        })
    }

    /// Reads a package from its bytes as a future.
    ///
    /// The read happens before this returns; the future is already complete.
    pub fn from_bytes_async(data: &[u8], options: &PackageReadOptions) -> Ready<Result<Self>> {
        ready(Self::from_bytes(data, options))
    }

    /// Reads a package file.
    pub fn from_path<P: AsRef<Path>>(path: P, options: &PackageReadOptions) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "reading package file");
        Self::from_bytes(&data, options)
    }

    /// Reads only the index table, without decompressing any payload.
    pub fn read_index(data: &[u8]) -> Result<Vec<IndexRecord>> {
        let reader = PackageReader::new(data);
        let header = reader.read_header()?;
        reader.read_index(&header)
    }

    /// Reads the resources of a package without building a package.
    pub fn extract_resources(
        data: &[u8],
        options: &PackageReadOptions,
    ) -> Result<Vec<(ResourceKey, Box<dyn Resource>)>> {
        let loaded = PackageReader::new(data).read_entries(options, &no_progress)?;
        Ok(loaded
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone_resource()))
            .collect())
    }

    /// Serializes the package, reporting progress per entry. Returns the
    /// cached bytes without reporting anything if they are still valid.
    pub fn serialize_with_progress(&self, progress: ProgressCallback) -> Result<Bytes> {
        self.cache()
            .get_or_try_init(|| writer::write_package(self.model.entries(), progress).map(Bytes::from))
    }

    /// Serializes the package to a file.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.serialize()?;
        std::fs::write(path.as_ref(), &bytes)?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote package file");
        Ok(())
    }

    /// Checks every entry, then checks that no two entries share a key.
    ///
    /// # Errors
    ///
    /// Returns the first entry's validation error, or
    /// [`Error::DuplicateKey`] naming the first repeated key.
    pub fn validate(&self) -> Result<()> {
        self.model.validate_entries()?;
        match self.model.find_repeated_keys().first() {
            Some(key) => Err(Error::DuplicateKey {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Whether both packages hold equal entries, in any order.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.model.entries_equal(&other.model)
    }
}

impl Deref for Package {
    type Target = MappedModel<ResourceEntry>;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl DerefMut for Package {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.model
    }
}

impl WritableModel for Package {
    fn cache(&self) -> &CacheCell {
        self.model.cache()
    }

    fn serialize_uncached(&self) -> Result<Vec<u8>> {
        writer::write_package(self.model.entries(), &no_progress)
    }
}
