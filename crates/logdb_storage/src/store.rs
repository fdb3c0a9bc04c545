//! File store trait definition.

use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Suffix of the temporary file a durable write goes through.
pub const SYNC_SUFFIX: &str = "-SYNC";

/// Suffix of copy artifacts left by interrupted whole-file rewrites.
pub const COPY_SUFFIX: &str = "_COPY";

/// Returns true if `name` is a transient artifact of an interrupted write.
#[must_use]
pub fn is_temp_name(name: &str) -> bool {
    name.ends_with(SYNC_SUFFIX) || name.ends_with(COPY_SUFFIX)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh temporary file name for one write of `name`.
///
/// Names are `<name>.<pid>.<n>-SYNC`, distinct for every call in the
/// process, so concurrent writers of the same file never share a
/// temporary.
#[must_use]
pub fn temp_name(name: &str) -> String {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{name}.{}.{n}{SYNC_SUFFIX}", std::process::id())
}

/// Checks that `name` is a plain file name a store can hold.
pub(crate) fn check_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || is_temp_name(name);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A flat collection of named byte blobs.
///
/// Stores are **opaque byte stores**: they never interpret the bytes
/// they hold. Every `write` replaces the whole file.
///
/// # Invariants
///
/// - After `write(name, data)` returns `Ok`, `read(name)` yields exactly `data`,
///   also after a process restart for persistent stores
/// - If the process dies during `write`, `name` holds either its previous
///   complete contents or the new complete contents, never a mix
/// - Temporary artifacts are never reported by `list`
///
/// # Implementors
///
/// - [`super::DirStore`] - one directory on disk
/// - [`super::InMemoryStore`] - for testing
pub trait FileStore: Send + Sync + std::fmt::Debug {
    /// Reads the full contents of `name`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the contents of `name` with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data could not be made durable. The previous
    /// contents of `name` are untouched in that case.
    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes `name`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn remove(&self, name: &str) -> StorageResult<bool>;

    /// Lists the names of all regular files, sorted, temporaries excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Deletes leftover temporary files and returns their names.
    ///
    /// A temporary file only exists if a write was interrupted, in which case
    /// its target still holds the previous complete contents.
    ///
    /// # Errors
    ///
    /// Returns an error if a leftover cannot be deleted.
    fn sweep_temp(&self) -> StorageResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names() {
        assert!(is_temp_name("LOG-1-SYNC"));
        assert!(is_temp_name("XINDEX_COPY"));
        assert!(!is_temp_name("LOG-1"));

        let a = temp_name("LOG-3");
        let b = temp_name("LOG-3");
        assert_ne!(a, b);
        assert!(a.starts_with("LOG-3."));
        assert!(is_temp_name(&a) && is_temp_name(&b));
    }

    #[test]
    fn name_checks() {
        assert!(check_name("LOG-1").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name("a/b").is_err());
        assert!(check_name("LOG-1-SYNC").is_err());
    }
}
