//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ users/            # One directory per table
//! │  ├─ LOG-1
//! │  ├─ XINDEX
//! │  └─ UINDEX
//! └─ posts/
//!    └─ ...
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// The database root directory, held under an exclusive lock.
///
/// Only one `DatabaseDir` can exist per directory at a time, across
/// processes. The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the directory of table `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `name` cannot be a directory name.
    pub fn table_path(&self, name: &str) -> CoreResult<PathBuf> {
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name == LOCK_FILE
            || name.contains(['/', '\\', '\0']);
        if bad {
            return Err(CoreError::validation(name, "not a valid table name"));
        }
        Ok(self.path.join(name))
    }

    /// Names of the table directories present on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn table_names(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
