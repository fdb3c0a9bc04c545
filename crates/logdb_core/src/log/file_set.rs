//! Metadata of a table's log files and file selection.

use crate::id::RecordId;
use crate::record::Record;
use std::collections::BTreeMap;

/// Prefix of log file names: `LOG-1`, `LOG-2`, ...
pub const LOG_PREFIX: &str = "LOG-";

/// Returns the name of log file number `n`.
#[must_use]
pub fn log_name(n: u32) -> String {
    format!("{LOG_PREFIX}{n}")
}

/// Parses a log file name, returning its number (always >= 1).
#[must_use]
pub fn parse_log_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(LOG_PREFIX)?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// What is known about one log file without loading it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMeta {
    /// Smallest id in the file, `None` while empty.
    pub first_id: Option<RecordId>,
    /// Greatest id in the file, `None` while empty.
    pub last_id: Option<RecordId>,
    /// Number of committed records.
    pub size: usize,
    /// Inserts routed to the file but not yet committed.
    pending: usize,
    /// Whether the file exists in the store.
    written: bool,
}

impl LogMeta {
    fn from_log(log: &[Record]) -> Self {
        Self {
            first_id: log.first().map(Record::id),
            last_id: log.last().map(Record::id),
            size: log.len(),
            pending: 0,
            written: true,
        }
    }

    fn contains(&self, id: &RecordId) -> bool {
        match (self.first_id, self.last_id) {
            (Some(first), Some(last)) => first <= *id && *id <= last,
            _ => false,
        }
    }
}

/// The log files of one table.
///
/// Each file covers the id range `[first_id, last_id]`. Ranges may
/// overlap, since a file that dropped below capacity takes new inserts
/// again, but a record always lies inside its file's range. Reads
/// therefore only consult files whose range contains the id.
#[derive(Debug, Clone)]
pub struct LogFileSet {
    capacity: usize,
    /// Keyed by file number, so iteration is creation order.
    files: BTreeMap<u32, LogMeta>,
}

impl LogFileSet {
    /// Creates an empty set with a soft cap of `capacity` records per file.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            files: BTreeMap::new(),
        }
    }

    /// Registers an existing file with its decoded contents.
    ///
    /// Returns false if `name` is not a log file name.
    pub fn register(&mut self, name: &str, log: &[Record]) -> bool {
        let Some(n) = parse_log_name(name) else {
            return false;
        };
        self.files.insert(n, LogMeta::from_log(log));
        true
    }

    /// Log files holding ids in a range containing `id`, by ascending `first_id`.
    ///
    /// The record, if it exists, is in one of these files.
    #[must_use]
    pub fn locate(&self, id: &RecordId) -> Vec<String> {
        let mut ranges: Vec<(RecordId, u32)> = self
            .files
            .iter()
            .filter_map(|(n, meta)| meta.first_id.map(|first| (first, *n)))
            .collect();
        ranges.sort_unstable();

        let end = ranges.partition_point(|(first, _)| first <= id);
        ranges[..end]
            .iter()
            .filter(|(_, n)| self.files.get(n).is_some_and(|meta| meta.contains(id)))
            .map(|(_, n)| log_name(*n))
            .collect()
    }

    /// Every log file, in creation order.
    #[must_use]
    pub fn select_all(&self) -> Vec<String> {
        self.files.keys().map(|n| log_name(*n)).collect()
    }

    /// Picks the file for one new record and reserves room in it.
    ///
    /// The first file, in creation order, whose committed plus pending size
    /// is below capacity is chosen; if every file is full a new one is
    /// registered.
    pub fn select_for_insert(&mut self) -> String {
        let capacity = self.capacity;
        let open = self
            .files
            .iter_mut()
            .find(|(_, meta)| meta.size + meta.pending < capacity);
        let n = match open {
            Some((n, meta)) => {
                meta.pending += 1;
                *n
            }
            None => {
                let n = self.files.keys().next_back().map_or(1, |last| last + 1);
                self.files.insert(
                    n,
                    LogMeta {
                        pending: 1,
                        ..LogMeta::default()
                    },
                );
                n
            }
        };
        log_name(n)
    }

    /// Updates a file after a commit of `inserts` reserved inserts.
    pub fn record_write_result(&mut self, name: &str, log: &[Record], inserts: usize) {
        let Some(n) = parse_log_name(name) else {
            return;
        };
        let meta = self.files.entry(n).or_default();
        let pending = meta.pending.saturating_sub(inserts);
        *meta = LogMeta {
            pending,
            ..LogMeta::from_log(log)
        };
    }

    /// Returns reservations of a commit that wrote nothing.
    ///
    /// A file that was never written and has nothing left pending is
    /// forgotten again. Files already in the store are always kept, even
    /// when empty.
    pub fn release_pending(&mut self, name: &str, inserts: usize) {
        let Some(n) = parse_log_name(name) else {
            return;
        };
        if let Some(meta) = self.files.get_mut(&n) {
            meta.pending = meta.pending.saturating_sub(inserts);
            if meta.pending == 0 && !meta.written {
                self.files.remove(&n);
            }
        }
    }

    /// Metadata of `name`.
    #[must_use]
    pub fn meta(&self, name: &str) -> Option<&LogMeta> {
        self.files.get(&parse_log_name(name)?)
    }

    /// `(name, metadata)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &LogMeta)> {
        self.files.iter().map(|(n, meta)| (log_name(*n), meta))
    }

    /// Committed records across all files.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.files.values().map(|meta| meta.size).sum()
    }

    /// Number of known files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no file is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
