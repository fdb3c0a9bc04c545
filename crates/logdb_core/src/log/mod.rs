//! Log file storage: id-sorted record files, their metadata and cache.
//!
//! A table's records live in `LOG-<n>` files. Each file is one encoded
//! array of records sorted by id, and every commit rewrites the whole
//! file atomically.

mod cache;
mod file_set;
mod sorted;

pub use cache::LogCache;
pub use file_set::{log_name, parse_log_name, LogFileSet, LogMeta, LOG_PREFIX};
pub use sorted::{binary_find, binary_insert, binary_mutate, is_sorted, Mutated, Mutation};
