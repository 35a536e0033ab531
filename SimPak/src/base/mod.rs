//! Building blocks shared by every model: byte caches, change tracking and
//! keyed entry collections

pub mod cacheable;
pub mod mapped;
pub mod writable;

pub use cacheable::{Bytes, CacheCell, Cacheable, OwnerLink};
pub use mapped::{EntryId, EntryMut, MappedEntry, MappedModel};
pub use writable::WritableModel;
