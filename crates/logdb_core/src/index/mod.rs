//! Per-table indexes.
//!
//! Every index here is derivable from the log files and is rebuilt from
//! them when its persisted file is missing or stale:
//!
//! - [`XTree`]: column value to record, for search and count (`XINDEX`)
//! - [`UniqueIndex`]: unique column value to its one record (`UINDEX`)
//! - [`ForeignIndex`]: relationship adjacency per record (`FINDEX`)
//!
//! `FINDEX` is the exception: relationship fields are not stored in the
//! records, so that file is authoritative and only pruned, never rebuilt.

mod foreign;
mod key;
mod unique;
mod xnode;
mod xtree;

pub use foreign::{ForeignIndex, Link};
pub use key::{FloatKey, IndexKey};
pub use unique::{Claim, UniqueIndex};
pub use xnode::XNode;
pub use xtree::XTree;
