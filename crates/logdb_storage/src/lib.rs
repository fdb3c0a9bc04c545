//! # LogDB Storage
//!
//! Crash-safe file store for LogDB.
//!
//! This crate provides the lowest-level storage abstraction for LogDB.
//! A store is a flat set of **opaque named blobs**; it does not interpret
//! the data it stores. Every write replaces a whole file and is atomic with
//! respect to crashes.
//!
//! ## Design Principles
//!
//! - Stores are simple blob maps (read, write, remove, list)
//! - No knowledge of log files, index files or the codec
//! - Must be `Send + Sync` for concurrent access
//! - LogDB owns all file format interpretation
//!
//! ## Available Stores
//!
//! - [`DirStore`] - One directory on disk, write-temp + fsync + rename
//! - [`InMemoryStore`] - For testing and ephemeral tables
//!
//! ## Example
//!
//! ```rust
//! use logdb_storage::{FileStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.write("LOG-1", b"hello world").unwrap();
//! let data = store.read("LOG-1").unwrap().unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod memory;
mod store;

pub use dir::{write_atomic, DirStore};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use store::{is_temp_name, temp_name, FileStore, COPY_SUFFIX, SYNC_SUFFIX};
