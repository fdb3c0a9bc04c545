//! Table statistics.
//!
//! ```rust,ignore
//! let stats = table.stats();
//! for log in &stats.logs {
//!     println!("{}: {} records", log.filename, log.size);
//! }
//! println!("batches committed: {}", stats.batches);
//! ```

use crate::id::RecordId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters of one table.
///
/// Counters only grow and can be read while writes are in flight.
#[derive(Debug, Default)]
pub struct TableCounters {
    reads: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    batches: AtomicU64,
    failed_batches: AtomicU64,
}

impl TableCounters {
    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, inserts: u64, updates: u64, deletes: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.inserts.fetch_add(inserts, Ordering::Relaxed);
        self.updates.fetch_add(updates, Ordering::Relaxed);
        self.deletes.fetch_add(deletes, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_batch(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }
}

/// One log file as seen by [`TableStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStats {
    /// File name, `LOG-<n>`.
    pub filename: String,
    /// Smallest id in the file.
    pub first_id: Option<RecordId>,
    /// Greatest id in the file.
    pub last_id: Option<RecordId>,
    /// Committed records in the file.
    pub size: usize,
}

/// Point-in-time snapshot of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Committed records across all log files.
    pub records: usize,
    /// Records in the secondary index.
    pub indexed: usize,
    /// Log files in creation order.
    pub logs: Vec<LogStats>,
    /// Log files currently held decoded in memory.
    pub cached_logs: usize,
    /// Reads served.
    pub reads: u64,
    /// Records inserted.
    pub inserts: u64,
    /// Records updated.
    pub updates: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Batches committed.
    pub batches: u64,
    /// Batches that failed to commit.
    pub failed_batches: u64,
}

impl TableStats {
    pub(crate) fn new(name: String, records: usize, indexed: usize, logs: Vec<LogStats>, counters: &TableCounters) -> Self {
        Self {
            name,
            records,
            indexed,
            logs,
            cached_logs: 0,
            reads: counters.reads.load(Ordering::Relaxed),
            inserts: counters.inserts.load(Ordering::Relaxed),
            updates: counters.updates.load(Ordering::Relaxed),
            deletes: counters.deletes.load(Ordering::Relaxed),
            batches: counters.batches.load(Ordering::Relaxed),
            failed_batches: counters.failed_batches.load(Ordering::Relaxed),
        }
    }
}
