//! Core copy operations.
//!
//! This module provides the chunked hashing copier for single files and
//! the enumeration of a source tree into copy tasks.

mod file;
mod tree;
mod utils;

// Re-export public API
pub use file::{HASH_SEED, VerifiedCopy, copy_file_hashed, hash_bytes, hash_file};
pub use tree::{SourceTree, enumerate_source};
pub use utils::display_relative;
pub(crate) use utils::ensure_dir;
