//! Options for reading packages
//!
//! Controls how much of a package is loaded and how each payload becomes a
//! resource.

use std::collections::HashMap;
use std::fmt;

use super::ResourceKey;
use crate::resources::ResourceDecoder;

/// Predicate deciding whether a resource is loaded
pub type ResourceFilter = Box<dyn Fn(&ResourceKey) -> bool>;

/// Options for reading a package.
///
/// # Example
///
/// ```
/// use simpak::package::PackageReadOptions;
/// use simpak::resources::types;
///
/// // Only load string tables, and keep going past broken entries
/// let options = PackageReadOptions::new()
///     .with_recovery_mode(true)
///     .with_resource_filter(|key| key.resource_type == types::STRING_TABLE);
/// ```
pub struct PackageReadOptions {
    /// Substitute a [`RawResource`](crate::resources::RawResource) carrying the
    /// failure reason for any entry that cannot be decompressed or decoded,
    /// instead of failing the whole read. A malformed header or index table
    /// still fails.
    pub recovery_mode: bool,

    /// Load every entry as a [`RawResource`](crate::resources::RawResource)
    /// without looking at its type or content
    pub load_raw: bool,

    /// Keep index records marked as deleted (dropped by default)
    pub keep_deleted_records: bool,

    /// Keep the input bytes as the package's cache, so an untouched package
    /// serializes to exactly what was read. Only applies when every record
    /// was loaded.
    /// Default: true
    pub save_buffer: bool,

    /// Stop after this many entries have been loaded
    pub limit: Option<usize>,

    /// Only load entries whose key passes this predicate
    pub resource_filter: Option<ResourceFilter>,

    /// Decoders for specific resource types, tried before the built-in ones
    pub decoders: HashMap<u32, ResourceDecoder>,
}

impl PackageReadOptions {
    /// Create options that load every entry strictly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recovery_mode: false,
            load_raw: false,
            keep_deleted_records: false,
            save_buffer: true,
            limit: None,
            resource_filter: None,
            decoders: HashMap::new(),
        }
    }

    /// Set whether broken entries are loaded as raw resources
    #[must_use]
    pub fn with_recovery_mode(mut self, recovery_mode: bool) -> Self {
        self.recovery_mode = recovery_mode;
        self
    }

    /// Set whether every entry is loaded as a raw resource
    #[must_use]
    pub fn with_load_raw(mut self, load_raw: bool) -> Self {
        self.load_raw = load_raw;
        self
    }

    /// Set whether records marked as deleted are kept
    #[must_use]
    pub fn with_keep_deleted_records(mut self, keep: bool) -> Self {
        self.keep_deleted_records = keep;
        self
    }

    /// Set whether the input bytes are kept as the package cache
    #[must_use]
    pub fn with_save_buffer(mut self, save_buffer: bool) -> Self {
        self.save_buffer = save_buffer;
        self
    }

    /// Limit the number of entries loaded
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Only load entries whose key passes `filter`
    #[must_use]
    pub fn with_resource_filter(mut self, filter: impl Fn(&ResourceKey) -> bool + 'static) -> Self {
        self.resource_filter = Some(Box::new(filter));
        self
    }

    /// Decode resources of `resource_type` with `decoder`
    #[must_use]
    pub fn with_decoder(mut self, resource_type: u32, decoder: ResourceDecoder) -> Self {
        self.decoders.insert(resource_type, decoder);
        self
    }

    /// Whether a record with this key passes the filter
    pub(crate) fn accepts(&self, key: &ResourceKey) -> bool {
        self.resource_filter.as_ref().is_none_or(|filter| filter(key))
    }
}

impl Default for PackageReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PackageReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decoders: Vec<String> = self
            .decoders
            .keys()
            .map(|ty| format!("{ty:08X}"))
            .collect();
        decoders.sort();

        f.debug_struct("PackageReadOptions")
            .field("recovery_mode", &self.recovery_mode)
            .field("load_raw", &self.load_raw)
            .field("keep_deleted_records", &self.keep_deleted_records)
            .field("save_buffer", &self.save_buffer)
            .field("limit", &self.limit)
            .field("resource_filter", &self.resource_filter.is_some())
            .field("decoders", &decoders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PackageReadOptions::default();
        assert!(!options.recovery_mode);
        assert!(!options.load_raw);
        assert!(!options.keep_deleted_records);
        assert!(options.save_buffer);
        assert_eq!(options.limit, None);
        assert!(options.accepts(&ResourceKey::new(1, 2, 3)));
    }

    #[test]
    fn test_filter() {
        let options = PackageReadOptions::new().with_resource_filter(|key| key.group == 0);
        assert!(options.accepts(&ResourceKey::new(1, 0, 3)));
        assert!(!options.accepts(&ResourceKey::new(1, 2, 3)));
    }
}
