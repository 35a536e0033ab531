//! Models with a cached serialized form and change tracking
//!
//! A writable model keeps the bytes it was read from (or last serialized to)
//! until something changes. Watched fields are only reachable through setters
//! and `update_*` callbacks that call [`WritableModel::on_change`], and any
//! `&mut` handle into a nested model is a guard that re-checks the owner chain
//! when dropped. There is no way to edit a watched field in place without
//! invalidating, so many edits before one read cost one serialization.

use super::cacheable::{Bytes, CacheCell};
use crate::error::Result;

/// A model whose serialized bytes are computed lazily and cached until the
/// model changes.
pub trait WritableModel {
    /// The cell holding this model's serialized bytes.
    fn cache(&self) -> &CacheCell;

    /// Serializes the current state, ignoring the cache.
    ///
    /// Callers should use [`WritableModel::serialize`]; this is the hook that
    /// implementations provide.
    fn serialize_uncached(&self) -> Result<Vec<u8>>;

    /// Returns the serialized bytes, reusing the cache when it is valid.
    fn serialize(&self) -> Result<Bytes> {
        self.cache()
            .get_or_try_init(|| self.serialize_uncached().map(Bytes::from))
    }

    /// Whether serialized bytes are currently cached.
    fn is_cached(&self) -> bool {
        self.cache().is_cached()
    }

    /// Discards the cached bytes here and in every owner above.
    fn uncache(&self) {
        self.cache().uncache();
    }

    /// Called by every setter of a watched field. Does not re-serialize.
    fn on_change(&self) {
        self.uncache();
    }
}
