//! Utility functions

pub mod hash;

pub use hash::{fnv24, fnv32, fnv56, fnv64};
