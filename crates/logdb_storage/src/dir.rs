//! Directory-backed file store with crash-safe replacement.

use crate::error::StorageResult;
use crate::store::{check_name, is_temp_name, temp_name, FileStore};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Atomically replaces the file at `path` with `data`.
///
/// Uses the write-then-rename pattern:
/// 1. Write `data` to a fresh `<path>.<pid>.<n>-SYNC` in the same directory
/// 2. Sync the temporary file to disk
/// 3. Rename the temporary file over `path`
/// 4. Fsync the directory so the rename itself is durable
///
/// A crash at any point leaves `path` with either its old or its new
/// contents. The temporary file is removed on failure when possible, and
/// [`DirStore::sweep_temp`] removes whatever a crash left behind.
///
/// # Errors
///
/// Returns an error if any step fails. `path` is untouched in that case.
pub fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    replace_file(path, data, true)
}

fn replace_file(path: &Path, data: &[u8], sync_dir: bool) -> StorageResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    replace_via(path, &path.with_file_name(temp_name(&file_name)), data, sync_dir)
}

fn replace_via(path: &Path, temp_path: &Path, data: &[u8], sync_dir: bool) -> StorageResult<()> {
    let result = (|| -> StorageResult<()> {
        let mut file = File::create_new(temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(temp_path, path)?;

        if sync_dir {
            if let Some(parent) = path.parent() {
                sync_directory(parent)?;
            }
        }
        Ok(())
    })();

    if result.is_err() {
        // Best effort: a leftover is also cleaned up by the startup sweep.
        let _ = fs::remove_file(temp_path);
    }
    result
}

/// Syncs a directory so that entry creation, rename and deletion are durable.
///
/// Windows NTFS journals metadata operations and does not support
/// opening a directory for fsync, so this is a no-op there.
#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    Ok(())
}

/// A file store rooted at one directory.
///
/// # Durability
///
/// Every `write` goes through [`write_atomic`]. Directory syncs after the
/// rename can be switched off for throughput at the cost of losing the most
/// recent commits (never tearing them) on power failure.
///
/// # Example
///
/// ```no_run
/// use logdb_storage::{DirStore, FileStore};
/// use std::path::Path;
///
/// let store = DirStore::open(Path::new("users")).unwrap();
/// store.write("LOG-1", b"records").unwrap();
/// assert_eq!(store.read("LOG-1").unwrap().as_deref(), Some(&b"records"[..]));
/// ```
#[derive(Debug)]
pub struct DirStore {
    path: PathBuf,
    sync_directory: bool,
}

impl DirStore {
    /// Opens the store, creating the directory (and parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sync_directory: true,
        })
    }

    /// Sets whether the directory is fsynced after each rename.
    #[must_use]
    pub fn with_directory_sync(mut self, enabled: bool) -> Self {
        self.sync_directory = enabled;
        self
    }

    /// Returns the directory this store lives in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl FileStore for DirStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        check_name(name)?;
        match fs::read(self.file_path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        check_name(name)?;
        replace_file(&self.file_path(name), data, self.sync_directory)
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        check_name(name)?;
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_temp_name(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn sweep_temp(&self) -> StorageResult<Vec<String>> {
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && is_temp_name(&name) {
                fs::remove_file(entry.path())?;
                tracing::warn!(dir = %self.path.display(), file = %name, "removed stale temporary file");
                removed.push(name);
            }
        }
        if !removed.is_empty() && self.sync_directory {
            sync_directory(&self.path)?;
        }
        removed.sort();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("table");

        let store = DirStore::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn write_and_read() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        store.write("LOG-1", b"hello").unwrap();
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"hello".to_vec()));

        store.write("LOG-1", b"replaced").unwrap();
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"replaced".to_vec()));
        assert!(store.sweep_temp().unwrap().is_empty());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert!(store.read("LOG-9").unwrap().is_none());
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        store.write("XINDEX", b"x").unwrap();
        assert!(store.remove("XINDEX").unwrap());
        assert!(!store.remove("XINDEX").unwrap());
    }

    #[test]
    fn list_skips_temporaries_and_dirs() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        store.write("LOG-2", b"b").unwrap();
        store.write("LOG-1", b"a").unwrap();
        fs::write(dir.path().join("LOG-3-SYNC"), b"partial").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["LOG-1", "LOG-2"]);
    }

    #[test]
    fn sweep_removes_interrupted_writes() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        store.write("LOG-1", b"complete").unwrap();
        fs::write(dir.path().join("LOG-1-SYNC"), b"compl").unwrap();
        fs::write(dir.path().join("UINDEX_COPY"), b"u").unwrap();

        let removed = store.sweep_temp().unwrap();
        assert_eq!(removed, vec!["LOG-1-SYNC", "UINDEX_COPY"]);
        assert_eq!(store.read("LOG-1").unwrap(), Some(b"complete".to_vec()));
        assert!(store.sweep_temp().unwrap().is_empty());
    }

    #[test]
    fn invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        assert!(store.write("../escape", b"x").is_err());
        assert!(store.write("LOG-1-SYNC", b"x").is_err());
    }

    #[test]
    fn write_atomic_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("FINDEX");

        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn failed_write_keeps_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("LOG-1");
        write_atomic(&path, b"old").unwrap();

        // A directory squatting on the temp name makes the create fail.
        let temp = dir.path().join("LOG-1.0.0-SYNC");
        fs::create_dir(&temp).unwrap();
        assert!(replace_via(&path, &temp, b"new", true).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert!(temp.is_dir());
    }

    #[test]
    fn concurrent_writers_never_tear() {
        const WRITERS: u8 = 8;
        const LEN: usize = 256 * 1024;
        let dir = tempdir().unwrap();
        let path = dir.path().join("LOG-1");
        write_atomic(&path, &vec![0; LEN]).unwrap();

        std::thread::scope(|scope| {
            for w in 1..=WRITERS {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..10 {
                        write_atomic(path, &vec![w; LEN]).unwrap();
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    let data = fs::read(&path).unwrap();
                    assert_eq!(data.len(), LEN);
                    assert!(data.iter().all(|&b| b == data[0]), "torn file");
                }
            });
        });

        let store = DirStore::open(dir.path()).unwrap();
        assert!(store.sweep_temp().unwrap().is_empty());
        let last = fs::read(&path).unwrap();
        assert!((1..=WRITERS).contains(&last[0]));
    }
}
