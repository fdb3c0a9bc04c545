//! # LogDB Core
//!
//! Core engine for LogDB, an embedded document store.
//!
//! This crate provides:
//! - Record ids and records (`_id` plus a map of fields)
//! - Log files: id-sorted record arrays with binary-search mutation and
//!   size-based insert routing
//! - The secondary index ([`XTree`]/[`XNode`]) with persistence and rebuild
//! - Unique and relationship indexes
//! - Per-file write queues that commit batches durably before answering
//! - The [`Database`] context owning the tables
//!
//! ## Example
//!
//! ```rust,ignore
//! use logdb_core::{Database, Query, TableSchema};
//!
//! let db = Database::open_in_memory();
//! let notes = db.create_table(TableSchema::new("notes")).await?;
//! let note = notes.insert(fields).await?;
//! let count = db.run_query("notes", Query::count_all()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod dir;
mod error;
mod id;
pub mod index;
pub mod log;
mod query;
mod record;
mod schema;
mod stats;
mod table;
mod writer;

pub use config::{Config, DEFAULT_LOG_CAPACITY};
pub use database::Database;
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult};
pub use id::{ParseRecordIdError, RecordId, RECORD_ID_HEX_LEN};
pub use index::{ForeignIndex, IndexKey, Link, UniqueIndex, XNode, XTree};
pub use query::{Query, QueryFields, QueryOp, QueryOutput, Selector};
pub use record::{Fields, Record, ID_FIELD};
pub use schema::{Column, FieldKind, RelationKind, Relationship, TableSchema, WriteMode};
pub use stats::{LogStats, TableCounters, TableStats};
pub use table::{Table, TableCore, WriteOp, FINDEX_FILE, UINDEX_FILE, XINDEX_FILE};
pub use writer::{BatchCommit, WriteCoordinator};

pub use logdb_codec::Value;
