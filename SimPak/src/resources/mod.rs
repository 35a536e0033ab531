//! Typed resources stored in packages
//!
//! A package treats its resources opaquely through the [`Resource`] trait.
//! Each kind knows how to read itself from decompressed bytes and how to
//! serialize itself back; the package only moves bytes and keeps caches
//! coherent.

use std::any::Any;
use std::fmt;

use crate::base::WritableModel;
use crate::error::Result;

mod raw;
pub mod stbl;
pub mod types;
mod xml;

pub use raw::RawResource;
pub use stbl::{StringEntry, StringTableResource};
pub use xml::XmlResource;

/// Which concrete kind a resource is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceVariant {
    /// Unparsed bytes
    Raw,
    /// Plain-text XML (tuning)
    Xml,
    /// String table
    StringTable,
    /// A kind defined outside this crate
    Custom(&'static str),
}

impl ResourceVariant {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Xml => "XML",
            Self::StringTable => "STBL",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ResourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource that can live in a package entry.
///
/// Implementors provide `serialize_uncached` (through [`WritableModel`]) plus
/// cloning and equality; the cached [`WritableModel::serialize`] is what
/// packages call. The variant is for callers to branch on and is never
/// inspected by the package itself.
pub trait Resource: WritableModel + fmt::Debug + Any {
    /// Which kind of resource this is.
    fn variant(&self) -> ResourceVariant;

    /// Deep copy with no cache and no owner.
    fn clone_resource(&self) -> Box<dyn Resource>;

    /// Content equality. Resources of different kinds are never equal.
    fn equals(&self, other: &dyn Resource) -> bool;

    /// Checks that every field fits the width it is written with.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Resource {
    /// Returns the concrete resource if it is a `T`.
    pub fn downcast_ref<T: Resource>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Returns the concrete resource mutably if it is a `T`.
    pub fn downcast_mut<T: Resource>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Whether this resource is a `T`.
    pub fn is<T: Resource>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Clone for Box<dyn Resource> {
    fn clone(&self) -> Self {
        self.clone_resource()
    }
}

impl PartialEq for dyn Resource {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// Decodes decompressed bytes into a resource of some kind
pub type ResourceDecoder = fn(&[u8]) -> Result<Box<dyn Resource>>;

/// Checks whether the bytes start with an XML declaration
#[must_use]
pub fn bytes_contain_xml(data: &[u8]) -> bool {
    data.starts_with(b"<?xml")
}

/// Picks a resource kind for a payload from its type id and content.
///
/// String tables are recognised by type. XML is recognised by a known tuning
/// type or by an XML declaration at the start of the payload. Anything else is
/// kept raw.
pub fn decode_resource(resource_type: u32, data: &[u8]) -> Result<Box<dyn Resource>> {
    if resource_type == types::STRING_TABLE {
        return Ok(Box::new(StringTableResource::from_bytes(data)?));
    }
    if types::is_tuning_type(resource_type) || bytes_contain_xml(data) {
        return Ok(Box::new(XmlResource::from_bytes(data)?));
    }
    Ok(Box::new(RawResource::from_bytes(data)))
}
