//! Resources kept as unparsed bytes

use std::any::Any;

use super::{Resource, ResourceVariant};
use crate::base::{Bytes, CacheCell, WritableModel};
use crate::error::{Error, Result};

/// A resource that has intentionally not been parsed.
///
/// The bytes are the content, so the cache is never cleared: serializing a
/// raw resource always returns the bytes it was created from.
#[derive(Debug)]
pub struct RawResource {
    buffer: Bytes,
    reason: Option<String>,
    cache: CacheCell,
}

impl RawResource {
    /// Creates a raw resource holding `data`.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_buffer(Bytes::from(data), None)
    }

    /// Creates a raw resource holding `data`, recording why it was not parsed.
    #[must_use]
    pub fn with_reason(data: &[u8], reason: impl Into<String>) -> Self {
        Self::from_buffer(Bytes::from(data), Some(reason.into()))
    }

    fn from_buffer(buffer: Bytes, reason: Option<String>) -> Self {
        Self {
            cache: CacheCell::with_value(buffer.clone()),
            buffer,
            reason,
        }
    }

    /// The raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The bytes as text, replacing invalid UTF-8.
    #[must_use]
    pub fn plain_text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Why this resource was loaded raw, if a reason was recorded.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl WritableModel for RawResource {
    fn cache(&self) -> &CacheCell {
        &self.cache
    }

    fn serialize_uncached(&self) -> Result<Vec<u8>> {
        Err(Error::SerializationUnsupported {
            variant: ResourceVariant::Raw.to_string(),
        })
    }

    fn uncache(&self) {
        // The bytes are the content; there is nothing to recompute.
    }
}

impl Resource for RawResource {
    fn variant(&self) -> ResourceVariant {
        ResourceVariant::Raw
    }

    fn clone_resource(&self) -> Box<dyn Resource> {
        Box::new(Self::from_buffer(self.buffer.clone(), None))
    }

    fn equals(&self, other: &dyn Resource) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| other.buffer == self.buffer)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
