//! In-memory file store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::{check_name, is_temp_name, FileStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory file store.
///
/// Suitable for unit tests, integration tests and ephemeral databases.
/// Writes can be made to fail on demand to exercise commit error paths.
///
/// # Example
///
/// ```rust
/// use logdb_storage::{FileStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.write("LOG-1", b"test data").unwrap();
/// assert_eq!(store.list().unwrap(), vec!["LOG-1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    failing: RwLock<BTreeSet<String>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `write` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes of `name` alone fail (or succeed again).
    pub fn set_fail_writes_to(&self, name: &str, fail: bool) {
        let mut failing = self.failing.write();
        if fail {
            failing.insert(name.to_string());
        } else {
            failing.remove(name);
        }
    }

    /// Places raw bytes under any name, temporaries included.
    ///
    /// Useful for planting the leftovers of a simulated crash.
    pub fn insert_raw(&self, name: &str, data: Vec<u8>) {
        self.files.write().insert(name.to_string(), data);
    }

    /// Returns true if a file with this exact name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }
}

impl FileStore for InMemoryStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        check_name(name)?;
        Ok(self.files.read().get(name).cloned())
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        check_name(name)?;
        if self.fail_writes.load(Ordering::SeqCst) || self.failing.read().contains(name) {
            return Err(StorageError::WriteFailed {
                name: name.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        self.files.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        check_name(name)?;
        Ok(self.files.write().remove(name).is_some())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .files
            .read()
            .keys()
            .filter(|name| !is_temp_name(name))
            .cloned()
            .collect())
    }

    fn sweep_temp(&self) -> StorageResult<Vec<String>> {
        let mut files = self.files.write();
        let stale: Vec<String> = files.keys().filter(|n| is_temp_name(n)).cloned().collect();
        for name in &stale {
            files.remove(name);
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let store = InMemoryStore::new();
        store.write("LOG-1", b"abc").unwrap();
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"abc".to_vec()));
        assert!(store.remove("LOG-1").unwrap());
        assert!(store.read("LOG-1").unwrap().is_none());
    }

    #[test]
    fn failed_writes_leave_contents() {
        let store = InMemoryStore::new();
        store.write("LOG-1", b"old").unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            store.write("LOG-1", b"new"),
            Err(StorageError::WriteFailed { .. })
        ));
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"old".to_vec()));

        store.set_fail_writes(false);
        store.write("LOG-1", b"new").unwrap();
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"new".to_vec()));

        store.set_fail_writes_to("UINDEX", true);
        assert!(store.write("UINDEX", b"u").is_err());
        store.write("LOG-1", b"newer").unwrap();
        store.set_fail_writes_to("UINDEX", false);
        store.write("UINDEX", b"u").unwrap();
    }

    #[test]
    fn sweep_and_list() {
        let store = InMemoryStore::new();
        store.write("LOG-1", b"a").unwrap();
        store.insert_raw("LOG-1-SYNC", b"partial".to_vec());

        assert_eq!(store.list().unwrap(), vec!["LOG-1"]);
        assert_eq!(store.sweep_temp().unwrap(), vec!["LOG-1-SYNC"]);
        assert!(!store.contains("LOG-1-SYNC"));
    }
}
