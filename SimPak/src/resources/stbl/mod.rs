//! String table (STBL) resources
//!
//! A string table is itself a [`MappedModel`] of `u32` hash to string, nested
//! inside a package entry. Editing a string invalidates the string table, the
//! package entry holding it, and the package.

mod reader;
mod writer;

use std::any::Any;
use std::ops::{Deref, DerefMut};

use super::{Resource, ResourceVariant};
use crate::base::{Bytes, CacheCell, Cacheable, EntryId, MappedEntry, MappedModel, WritableModel};
use crate::error::{Error, Result};
use crate::utils::fnv32;

/// "STBL" magic bytes
pub const MAGIC: [u8; 4] = *b"STBL";

/// The only string table version this library reads and writes
pub const VERSION: u16 = 5;

/// Size of the fixed header before the first entry
pub const HEADER_SIZE: usize = 21;

/// One string in a string table.
#[derive(Debug)]
pub struct StringEntry {
    key: u32,
    value: String,
    cache: CacheCell<()>,
}

impl StringEntry {
    /// The string.
    #[must_use]
    pub fn string(&self) -> &str {
        &self.value
    }

    /// Replaces the string.
    pub fn set_string(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cache.uncache();
    }

    /// Replaces the key. Must be done through the string table's
    /// [`EntryMut`](crate::base::EntryMut) so the key index follows.
    pub fn set_key(&mut self, key: u32) {
        self.key = key;
        self.cache.uncache();
    }
}

impl Clone for StringEntry {
    fn clone(&self) -> Self {
        Self::new(self.key, self.value.clone())
    }
}

impl MappedEntry for StringEntry {
    type Key = u32;
    type Value = String;

    fn new(key: u32, value: String) -> Self {
        Self {
            key,
            value,
            cache: CacheCell::new(),
        }
    }

    fn key(&self) -> &u32 {
        &self.key
    }

    fn value(&self) -> &String {
        &self.value
    }

    fn cacheable(&self) -> &dyn Cacheable {
        &self.cache
    }

    fn validate(&self) -> Result<()> {
        let len = self.value.len();
        if len > usize::from(u16::MAX) {
            return Err(Error::ValueOutOfRange {
                field: "string length",
                value: len as u64,
                max: u64::from(u16::MAX),
            });
        }
        Ok(())
    }

    fn equals(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

/// Model for string table (STBL) resources.
#[derive(Debug, Default)]
pub struct StringTableResource {
    model: MappedModel<StringEntry>,
}

impl StringTableResource {
    /// Creates a string table with the given entries.
    #[must_use]
    pub fn create(entries: Vec<(u32, String)>) -> Self {
        Self {
            model: MappedModel::from_pairs(entries),
        }
    }

    /// Reads a string table, keeping the bytes as the cache.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let pairs = reader::read_stbl(data)?;
        let entries = pairs
            .into_iter()
            .map(|(key, value)| StringEntry::new(key, value));
        Ok(Self {
            model: MappedModel::from_entries(entries, CacheCell::with_value(Bytes::from(data))),
        })
    }

    /// Adds `value` keyed by the FNV-32 hash of `to_hash`, or of `value`
    /// itself when no other string is given.
    pub fn add_and_hash(&mut self, value: impl Into<String>, to_hash: Option<&str>) -> Result<EntryId> {
        let value = value.into();
        let key = fnv32(to_hash.unwrap_or(&value));
        self.model.add(key, value)
    }
}

impl Deref for StringTableResource {
    type Target = MappedModel<StringEntry>;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl DerefMut for StringTableResource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.model
    }
}

impl WritableModel for StringTableResource {
    fn cache(&self) -> &CacheCell {
        self.model.cache()
    }

    fn serialize_uncached(&self) -> Result<Vec<u8>> {
        writer::write_stbl(self.model.entries())
    }
}

impl Resource for StringTableResource {
    fn variant(&self) -> ResourceVariant {
        ResourceVariant::StringTable
    }

    fn clone_resource(&self) -> Box<dyn Resource> {
        Box::new(Self {
            model: self.model.clone(),
        })
    }

    fn equals(&self, other: &dyn Resource) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| other.model.entries_equal(&self.model))
    }

    fn validate(&self) -> Result<()> {
        self.model.validate_entries()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StringTableResource {
        StringTableResource::create(vec![
            (0x1234_5678, "First".to_string()),
            (0x0BAD_F00D, "Second, with ünïcode".to_string()),
        ])
    }

    #[test]
    fn test_serialize_then_read() {
        let original = table();
        let bytes = original.serialize().unwrap();
        assert_eq!(&bytes[..4], b"STBL");

        let read = StringTableResource::from_bytes(&bytes).unwrap();
        assert_eq!(read.len(), 2);
        assert!(read.is_cached());
        assert_eq!(read.get_by_key(&0x0BAD_F00D).unwrap().string(), "Second, with ünïcode");
        assert!(read.equals(&original));
        assert_eq!(read.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_string_edit_invalidates_table() {
        let mut stbl = StringTableResource::from_bytes(&table().serialize().unwrap()).unwrap();
        stbl.get_mut(0).unwrap().set_string("Changed");
        assert!(!stbl.is_cached());

        let reread = StringTableResource::from_bytes(&stbl.serialize().unwrap()).unwrap();
        assert_eq!(reread.get(0).unwrap().string(), "Changed");
    }

    #[test]
    fn test_key_edit_reindexes() {
        let mut stbl = table();
        stbl.get_mut(1).unwrap().set_key(7);
        assert_eq!(stbl.get_by_key(&7).unwrap().string(), "Second, with ünïcode");
        assert!(!stbl.has_key(&0x0BAD_F00D));
    }

    #[test]
    fn test_add_and_hash() {
        let mut stbl = StringTableResource::default();
        let id = stbl.add_and_hash("Hello", None).unwrap();
        assert_eq!(*stbl.get(id).unwrap().key(), fnv32("Hello"));
        let id = stbl.add_and_hash("Hello", Some("greeting")).unwrap();
        assert_eq!(*stbl.get(id).unwrap().key(), fnv32("greeting"));
    }

    #[test]
    fn test_equality_ignores_order() {
        let reversed = StringTableResource::create(vec![
            (0x0BAD_F00D, "Second, with ünïcode".to_string()),
            (0x1234_5678, "First".to_string()),
        ]);
        assert!(table().equals(&reversed));
        assert!(!table().equals(&StringTableResource::default()));
    }

    #[test]
    fn test_validate_rejects_long_strings() {
        let stbl = StringTableResource::create(vec![(1, "x".repeat(usize::from(u16::MAX) + 1))]);
        assert!(matches!(stbl.validate(), Err(Error::ValueOutOfRange { .. })));
        assert!(table().validate().is_ok());
    }

    #[test]
    fn test_clone_is_uncached_and_equal() {
        let stbl = StringTableResource::from_bytes(&table().serialize().unwrap()).unwrap();
        let copy = stbl.clone_resource();
        assert!(!copy.is_cached());
        assert!(copy.equals(&stbl));
    }
}
