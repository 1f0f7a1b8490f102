//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// Suitable for unit tests and stores that do not need to outlive the
/// process. [`InMemoryBackend::fail_after`] turns it into a faulty disk that
/// rejects appends once a budget is spent, which is how the store's partial
/// batch behaviour is tested.
///
/// # Example
///
/// ```rust
/// use bilisync_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new().fail_after(1);
/// assert!(backend.append(b"ok").is_ok());
/// assert!(backend.append(b"rejected").is_err());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    appends: RwLock<u64>,
    append_budget: Option<u64>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with bytes, e.g. a log image captured
    /// from another backend.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            ..Self::default()
        }
    }

    /// Makes every append after the first `appends` fail.
    #[must_use]
    pub fn fail_after(mut self, appends: u64) -> Self {
        self.append_budget = Some(appends);
        self
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut appends = self.appends.write();
        if let Some(budget) = self.append_budget {
            if *appends >= budget {
                return Err(StorageError::InjectedFailure { writes: *appends });
            }
        }
        *appends += 1;

        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}
