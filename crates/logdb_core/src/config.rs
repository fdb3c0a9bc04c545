//! Database configuration.

/// Default soft cap on records per log file.
pub const DEFAULT_LOG_CAPACITY: usize = 32_768;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Soft cap on the number of records in one log file.
    ///
    /// Inserts go to the first log below this size; once every log is at
    /// the cap a new log file is started.
    pub log_capacity: usize,

    /// Whether to persist the secondary, unique and relationship indexes
    /// after every committed batch. When off they are written on `close`.
    pub persist_index: bool,

    /// Whether to fsync the table directory after each file replacement.
    pub sync_directory: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            log_capacity: DEFAULT_LOG_CAPACITY,
            persist_index: true,
            sync_directory: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the soft cap on records per log file. Zero is treated as one.
    #[must_use]
    pub const fn log_capacity(mut self, records: usize) -> Self {
        self.log_capacity = if records == 0 { 1 } else { records };
        self
    }

    /// Sets whether indexes are persisted after every batch.
    #[must_use]
    pub const fn persist_index(mut self, value: bool) -> Self {
        self.persist_index = value;
        self
    }

    /// Sets whether the table directory is fsynced after each rename.
    #[must_use]
    pub const fn sync_directory(mut self, value: bool) -> Self {
        self.sync_directory = value;
        self
    }
}
