#![allow(non_snake_case)]
//! # SimPak
//!
//! A pure-Rust library for reading, mutating and rewriting The Sims 4 package
//! (DBPF) files and the resources stored inside them.
//!
//! ## Supported Formats
//!
//! - **Packages** - DBPF 2.x containers with uncompressed, ZLIB and internal
//!   (`RefPack`) compressed entries
//! - **String tables** - STBL v5, editable entry by entry
//! - **Tuning** - plain-text XML resources
//! - **Anything else** - kept as raw bytes and written back untouched
//!
//! ## Caching
//!
//! Every model keeps the bytes it was read from until something changes.
//! Editing a string in a string table clears the string table's bytes, the
//! compressed bytes of the package entry holding it, and the package's bytes,
//! and nothing else. Serializing afterwards recompresses that one entry and
//! copies every other entry's stored bytes as they were.
//!
//! ## Quick Start
//!
//! ```no_run
//! use simpak::prelude::*;
//!
//! let options = PackageReadOptions::default();
//! let mut package = Package::from_path("Mod.package", &options)?;
//!
//! // Rename every string in every string table
//! for id in package.entry_ids().iter().copied() {
//!     if let Some(mut entry) = package.get_mut(id) {
//!         entry.update_value(|stbl: &mut StringTableResource| {
//!             for id in stbl.entry_ids().iter().copied() {
//!                 if let Some(mut string) = stbl.get_mut(id) {
//!                     let renamed = format!("[Edited] {}", string.string());
//!                     string.set_string(renamed);
//!                 }
//!             }
//!         });
//!     }
//! }
//!
//! package.validate()?;
//! package.write_to_path("Mod.package")?;
//! # Ok::<(), simpak::Error>(())
//! ```

pub mod base;
pub mod compression;
pub mod error;
pub mod package;
pub mod resources;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::base::{EntryId, MappedEntry, MappedModel, WritableModel};
    pub use crate::error::{Error, Result};
    pub use crate::package::{
        CompressionType, Package, PackageReadOptions, ResourceEntry, ResourceKey,
    };
    pub use crate::resources::{
        RawResource, Resource, ResourceVariant, StringEntry, StringTableResource, XmlResource,
    };
    pub use crate::utils::{fnv32, fnv64};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
