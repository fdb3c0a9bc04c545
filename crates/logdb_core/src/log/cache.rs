//! In-memory copies of decoded log files (the RCT).

use crate::record::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Decoded log files keyed by file name.
///
/// Entries are immutable snapshots. The write coordinator, the only
/// mutator of a log file, builds a new vector and swaps it in with
/// [`put`](Self::put). Readers only ever fill a missing entry, so a
/// reader that loaded a file before a commit cannot hide that commit.
#[derive(Debug, Default)]
pub struct LogCache {
    entries: RwLock<HashMap<String, Arc<Vec<Record>>>>,
}

impl LogCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached snapshot of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Vec<Record>>> {
        self.entries.read().get(name).cloned()
    }

    /// Caches `log` for `name` unless an entry exists, and returns the entry.
    pub fn fill(&self, name: &str, log: Vec<Record>) -> Arc<Vec<Record>> {
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(name.to_string()).or_insert_with(|| Arc::new(log)))
    }

    /// Replaces the snapshot of `name` after a commit.
    pub fn put(&self, name: &str, log: Arc<Vec<Record>>) {
        self.entries.write().insert(name.to_string(), log);
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
