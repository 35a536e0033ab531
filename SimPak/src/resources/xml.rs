//! Plain-text XML resources (tuning)

use std::any::Any;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Resource, ResourceVariant};
use crate::base::{Bytes, CacheCell, WritableModel};
use crate::error::Result;

/// Model for a plain-text XML resource.
///
/// `content` is a watched field: it can only be changed through
/// [`XmlResource::set_content`] or [`XmlResource::update_content`], both of
/// which invalidate the cached bytes and every owner above them.
#[derive(Debug, Default)]
pub struct XmlResource {
    content: String,
    cache: CacheCell,
}

impl XmlResource {
    /// Creates a resource with the given XML content.
    #[must_use]
    pub fn create(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            cache: CacheCell::new(),
        }
    }

    /// Reads an XML resource from UTF-8 bytes, keeping them as the cache.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let content = String::from_utf8(data.to_vec())?;
        Ok(Self {
            content,
            cache: CacheCell::with_value(Bytes::from(data)),
        })
    }

    /// The XML text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replaces the XML text.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.on_change();
    }

    /// Edits the XML text in place, then invalidates.
    pub fn update_content<F: FnOnce(&mut String)>(&mut self, f: F) {
        f(&mut self.content);
        self.on_change();
    }

    /// Name of the first element, e.g. `I` for tuning.
    pub fn root_element_name(&self) -> Result<Option<String>> {
        self.with_root(|root| Ok(String::from_utf8_lossy(root.name().as_ref()).into_owned()))
            .map_err(Into::into)
    }

    /// The `n` attribute of the first element, which names a tuning instance.
    pub fn tuning_name(&self) -> Result<Option<String>> {
        let name = self.with_root(|root| {
            let attr = root
                .try_get_attribute("n")
                .map_err(quick_xml::Error::from)?;
            attr.map(|attr| attr.unescape_value().map(std::borrow::Cow::into_owned))
                .transpose()
        })?;
        Ok(name.flatten())
    }

    /// Whether the content parses as XML with matching tags.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let mut reader = Reader::from_str(&self.content);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    }

    fn with_root<T>(
        &self,
        f: impl FnOnce(&BytesStart<'_>) -> std::result::Result<T, quick_xml::Error>,
    ) -> std::result::Result<Option<T>, quick_xml::Error> {
        let mut reader = Reader::from_str(&self.content);
        loop {
            match reader.read_event()? {
                Event::Start(root) | Event::Empty(root) => return f(&root).map(Some),
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl WritableModel for XmlResource {
    fn cache(&self) -> &CacheCell {
        &self.cache
    }

    fn serialize_uncached(&self) -> Result<Vec<u8>> {
        Ok(self.content.as_bytes().to_vec())
    }
}

impl Resource for XmlResource {
    fn variant(&self) -> ResourceVariant {
        ResourceVariant::Xml
    }

    fn clone_resource(&self) -> Box<dyn Resource> {
        Box::new(Self::create(self.content.clone()))
    }

    fn equals(&self, other: &dyn Resource) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| other.content == self.content)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
