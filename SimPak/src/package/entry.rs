//! Package entries: a resource key, a resource, and the compressed bytes
//! written for them

use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::trace;

use super::{CompressionType, ResourceKey};
use crate::base::{Bytes, CacheCell, Cacheable, MappedEntry};
use crate::compression;
use crate::error::{Error, Result};
use crate::resources::Resource;

/// A payload as it is stored in a package, with what is needed to write its
/// index record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBuffer {
    /// Compressed bytes
    pub data: Bytes,
    /// Compression the bytes were written with
    pub compression: CompressionType,
    /// Size of the payload once decompressed
    pub mem_size: u32,
}

/// One resource in a [`Package`](super::Package).
///
/// The entry keeps two caches: the resource's own serialized bytes, and the
/// compressed buffer built from them. Any change to the key, the resource or
/// the compression type clears the compressed buffer and the package bytes.
pub struct ResourceEntry {
    key: ResourceKey,
    value: Box<dyn Resource>,
    compression: CompressionType,
    cache: CacheCell<CompressedBuffer>,
}

impl ResourceEntry {
    /// Builds an entry read from a package, keeping the stored payload so an
    /// untouched entry is written back byte for byte.
    pub(crate) fn from_stored(
        key: ResourceKey,
        value: Box<dyn Resource>,
        buffer: CompressedBuffer,
    ) -> Self {
        let entry = Self {
            key,
            value,
            compression: buffer.compression,
            cache: CacheCell::with_value(buffer),
        };
        entry.link_value();
        entry
    }

    /// Key of the resource.
    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Replaces the key.
    ///
    /// Reached through the package's [`EntryMut`](crate::base::EntryMut), which
    /// moves the entry in the key index when the guard is dropped.
    pub fn set_key(&mut self, key: ResourceKey) {
        self.key = key;
        self.cache.uncache();
    }

    /// The resource.
    #[must_use]
    pub fn value(&self) -> &dyn Resource {
        self.value.as_ref()
    }

    /// The resource as a concrete type, if it is one.
    #[must_use]
    pub fn value_as<T: Resource>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Mutable access to the resource.
    ///
    /// The resource's own setters invalidate this entry. If the resource is
    /// replaced through the guard (e.g. `*xml = XmlResource::create(..)` after a
    /// downcast), the replacement is linked to this entry when the guard drops.
    pub fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut { entry: self }
    }

    /// Edits the resource as a concrete type. Returns `None`, without calling
    /// `f`, if the resource is not a `T`.
    pub fn update_value<T: Resource, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.value_mut();
        guard.downcast_mut::<T>().map(f)
    }

    /// Replaces the resource, returning the previous one unlinked from this
    /// entry.
    pub fn set_value(&mut self, value: Box<dyn Resource>) -> Box<dyn Resource> {
        let previous = std::mem::replace(&mut self.value, value);
        previous.cache().clear_owner();
        self.link_value();
        self.cache.uncache();
        previous
    }

    /// Compression used when this entry is next written.
    #[must_use]
    pub fn compression_type(&self) -> CompressionType {
        self.compression
    }

    /// Changes the compression used when this entry is next written.
    pub fn set_compression_type(&mut self, compression: CompressionType) {
        if self.compression != compression {
            self.compression = compression;
            self.cache.uncache();
        }
    }

    /// The payload as it will be written, compressing the resource if the
    /// cached buffer is stale.
    pub fn compressed_buffer(&self) -> Result<CompressedBuffer> {
        self.cache.get_or_try_init(|| {
            let data = self.value.serialize()?;
            let mem_size = u32::try_from(data.len()).map_err(|_| Error::ValueOutOfRange {
                field: "resource size",
                value: data.len() as u64,
                max: u64::from(u32::MAX),
            })?;
            let codec = self.compression.for_writing();
            let compressed = compression::compress(&data, codec)?;
            trace!(
                key = %self.key,
                compression = %codec,
                mem_size,
                file_size = compressed.len(),
                "compressed resource"
            );
            Ok(CompressedBuffer {
                data: Bytes::from(compressed),
                compression: codec,
                mem_size,
            })
        })
    }

    fn link_value(&self) {
        self.value.cache().set_owner(&self.cache.owner_link());
    }
}

impl MappedEntry for ResourceEntry {
    type Key = ResourceKey;
    type Value = Box<dyn Resource>;

    fn new(key: ResourceKey, value: Box<dyn Resource>) -> Self {
        let entry = Self {
            key,
            value,
            compression: CompressionType::default(),
            cache: CacheCell::new(),
        };
        entry.link_value();
        entry
    }

    fn key(&self) -> &ResourceKey {
        &self.key
    }

    #[allow(clippy::borrowed_box)]
    fn value(&self) -> &Box<dyn Resource> {
        &self.value
    }

    fn cacheable(&self) -> &dyn Cacheable {
        &self.cache
    }

    fn validate(&self) -> Result<()> {
        self.key.validate()?;
        self.value.validate()
    }

    fn equals(&self, other: &Self) -> bool {
        self.key_equals(&other.key) && self.value.equals(other.value.as_ref())
    }
}

impl Clone for ResourceEntry {
    /// Deep copy with no cache and no owner.
    fn clone(&self) -> Self {
        let mut entry = <Self as MappedEntry>::new(self.key, self.value.clone_resource());
        entry.compression = self.compression;
        entry
    }
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("key", &self.key.to_string())
            .field("variant", &self.value.variant())
            .field("compression", &self.compression)
            .field("cached", &self.cache.is_cached())
            .finish()
    }
}

/// Mutable access to the resource of a [`ResourceEntry`].
///
/// On drop, links the resource to the entry again if it was replaced in
/// place, and clears the entry's compressed buffer in that case.
pub struct ValueMut<'a> {
    entry: &'a mut ResourceEntry,
}

impl Deref for ValueMut<'_> {
    type Target = dyn Resource;

    fn deref(&self) -> &Self::Target {
        self.entry.value.as_ref()
    }
}

impl DerefMut for ValueMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.entry.value.as_mut()
    }
}

impl Drop for ValueMut<'_> {
    fn drop(&mut self) {
        let owner = self.entry.cache.owner_link();
        if !self.entry.value.cache().is_owned_by(&owner) {
            self.entry.link_value();
            self.entry.cache.uncache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{RawResource, XmlResource};

    fn xml_entry(content: &str) -> ResourceEntry {
        ResourceEntry::new(
            ResourceKey::new(1, 2, 3),
            Box::new(XmlResource::create(content)),
        )
    }

    #[test]
    fn test_compressed_buffer_is_cached() {
        let entry = xml_entry("<I/>");
        let first = entry.compressed_buffer().unwrap();
        assert_eq!(first.compression, CompressionType::Zlib);
        assert_eq!(first.mem_size, 4);
        let second = entry.compressed_buffer().unwrap();
        assert!(std::rc::Rc::ptr_eq(&first.data, &second.data));
    }

    #[test]
    fn test_resource_setter_clears_compressed_buffer() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        entry
            .update_value(|xml: &mut XmlResource| xml.set_content("<M/>"))
            .unwrap();
        assert!(!entry.cache.is_cached());
        assert_eq!(entry.compressed_buffer().unwrap().mem_size, 4);
        assert_eq!(entry.value_as::<XmlResource>().unwrap().content(), "<M/>");
    }

    #[test]
    fn test_update_value_with_wrong_type() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        assert!(entry.update_value(|_: &mut RawResource| ()).is_none());
        assert!(entry.cache.is_cached());
    }

    #[test]
    fn test_reading_through_guard_keeps_cache() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        {
            let guard = entry.value_mut();
            assert!(guard.is::<XmlResource>());
        }
        assert!(entry.cache.is_cached());
    }

    #[test]
    fn test_replacement_through_guard_is_relinked() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        {
            let mut guard = entry.value_mut();
            let xml = guard.downcast_mut::<XmlResource>().unwrap();
            *xml = XmlResource::create("<Replaced/>");
        }
        assert!(!entry.cache.is_cached());
        entry.compressed_buffer().unwrap();

        // The replacement now invalidates the entry like the original did
        entry
            .update_value(|xml: &mut XmlResource| xml.set_content("<Again/>"))
            .unwrap();
        assert!(!entry.cache.is_cached());
    }

    #[test]
    fn test_set_value_unlinks_previous() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        let previous = entry.set_value(Box::new(XmlResource::create("<M/>")));
        assert!(!entry.cache.is_cached());
        assert!(!previous.cache().has_owner());

        entry.compressed_buffer().unwrap();
        previous.uncache();
        assert!(entry.cache.is_cached());
    }

    #[test]
    fn test_set_compression_type() {
        let mut entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        entry.set_compression_type(CompressionType::Zlib);
        assert!(entry.cache.is_cached());

        entry.set_compression_type(CompressionType::Uncompressed);
        assert!(!entry.cache.is_cached());
        let buffer = entry.compressed_buffer().unwrap();
        assert_eq!(buffer.compression, CompressionType::Uncompressed);
        assert_eq!(&*buffer.data, b"<I/>");
    }

    #[test]
    fn test_deleted_record_recompresses_as_zlib() {
        let mut entry = xml_entry("<I/>");
        entry.set_compression_type(CompressionType::DeletedRecord);
        assert_eq!(entry.compressed_buffer().unwrap().compression, CompressionType::Zlib);
    }

    #[test]
    fn test_clone_is_independent() {
        let entry = xml_entry("<I/>");
        entry.compressed_buffer().unwrap();
        let copy = entry.clone();
        assert!(!copy.cache.is_cached());
        assert!(!copy.value().is_cached());
        assert!(copy.equals(&entry));
    }

    #[test]
    fn test_equality() {
        assert!(xml_entry("<I/>").equals(&xml_entry("<I/>")));
        assert!(!xml_entry("<I/>").equals(&xml_entry("<M/>")));
        let other_key = ResourceEntry::new(ResourceKey::new(1, 9, 3), Box::new(XmlResource::create("<I/>")));
        assert!(!xml_entry("<I/>").equals(&other_key));
    }
}
