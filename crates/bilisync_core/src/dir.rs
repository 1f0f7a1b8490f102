//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                 # Advisory lock for single-writer
//! ├─ records.log          # Record log
//! └─ records.log.compact  # Compaction output, renamed over records.log
//! ```
//!
//! The LOCK file ensures only one process (one CLI invocation or the
//! daemon) writes to the store at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "records.log";
const COMPACT_FILE: &str = "records.log.compact";

/// Holds the store directory and its exclusive lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
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
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the record log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the path compaction writes to before it is installed.
    #[must_use]
    pub fn compaction_path(&self) -> PathBuf {
        self.path.join(COMPACT_FILE)
    }

    /// Removes a compaction file left behind by an interrupted compaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn discard_stale_compaction(&self) -> CoreResult<bool> {
        let path = self.compaction_path();
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Renames the compaction output over the record log.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename or directory sync fails.
    pub fn install_compacted(&self) -> CoreResult<()> {
        fs::rename(self.compaction_path(), self.log_path())?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("store");

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert_eq!(dir.log_path(), store_path.join("records.log"));
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("missing"), false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked");

        let _first = StoreDir::open(&store_path, true).unwrap();
        let second = StoreDir::open(&store_path, true);
        assert!(matches!(second, Err(CoreError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen");

        drop(StoreDir::open(&store_path, true).unwrap());
        assert!(StoreDir::open(&store_path, true).is_ok());
    }

    #[test]
    fn install_compacted_replaces_log() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        fs::write(dir.log_path(), b"old").unwrap();
        fs::write(dir.compaction_path(), b"new").unwrap();

        dir.install_compacted().unwrap();
        assert_eq!(fs::read(dir.log_path()).unwrap(), b"new");
        assert!(!dir.discard_stale_compaction().unwrap());
    }
}
