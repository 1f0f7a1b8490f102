//! File-based storage backend for the on-disk record log.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Holds one open handle for the lifetime of the store. The cached size is
/// the offset of the next append, so readers never observe a frame that is
/// still being written.
///
/// # Durability
///
/// - `flush()` pushes buffered bytes to the OS
/// - `sync()` and `truncate()` call `File::sync_all()`
///
/// # Example
///
/// ```no_run
/// use bilisync_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("records.log")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates the file at `path` without truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: RwLock::new(size),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut size = self.size.write();
        let offset = *size;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut size = self.size.write();
        if new_size > *size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: *size,
            });
        }

        let file = self.file.lock();
        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;
        Ok(())
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(size as usize);
        (&mut *file).take(size).read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.log");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn frames_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.log");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.append(b"first").unwrap(), 0);
            assert_eq!(backend.append(b"second").unwrap(), 5);
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(5, 6).unwrap(), b"second");
        assert_eq!(backend.read_all().unwrap(), b"firstsecond");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("records.log")).unwrap();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(3, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(2, 0).unwrap().is_empty());
    }

    #[test]
    fn empty_append_is_a_noop() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("records.log")).unwrap();
        backend.append(b"x").unwrap();

        assert_eq!(backend.append(b"").unwrap(), 1);
        assert_eq!(backend.size().unwrap(), 1);
    }

    #[test]
    fn truncate_drops_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"complete").unwrap();
        backend.append(b"torn").unwrap();
        backend.truncate(8).unwrap();
        backend.append(b"!").unwrap();
        backend.flush().unwrap();

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.read_all().unwrap(), b"complete!");
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncatePastEnd { .. })
        ));
    }
}
