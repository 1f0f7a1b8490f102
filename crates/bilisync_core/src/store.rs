//! The local store.
//!
//! [`LocalStore`] keeps every collection in memory, rebuilt from the record
//! log on open, and appends a frame for every change. Writers are serialized
//! by the log mutex; readers only take short per-collection read locks, so a
//! query never waits for a whole sync page to finish and may observe a
//! partially written batch.

use crate::collection::{Collection, Record};
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::CoreResult;
use crate::log::{CompactionResult, Compactor, LogRecord, RecordLog};
use crate::model::{FavoriteFolder, FavoriteResource, HistoryRecord};
use crate::types::CollectionId;
use bilisync_codec::{from_cbor, to_cbor};
use bilisync_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use tracing::{debug, info, warn};

/// Counters describing the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// History records.
    pub history: usize,
    /// Favorite folders.
    pub folders: usize,
    /// Favorite resources.
    pub resources: usize,
    /// Frames in the record log, including superseded ones.
    pub log_frames: u64,
    /// Record log size in bytes.
    pub log_bytes: u64,
}

/// Durable keyed storage for history and favorites.
///
/// # Batches
///
/// Multi-record writes append one frame per record and flush once at the
/// end. If a frame fails to append the call returns the error, and the
/// records written before it stay applied; there is no rollback.
///
/// # Example
///
/// ```rust
/// use bilisync_core::{HistoryRecord, LocalStore};
///
/// let store = LocalStore::open_in_memory().unwrap();
/// store.put_history(&HistoryRecord { id: 1, view_at: 100, ..Default::default() }).unwrap();
/// assert_eq!(store.history_count(), 1);
/// ```
pub struct LocalStore {
    config: Config,
    dir: Option<StoreDir>,
    log: Mutex<RecordLog>,
    history: RwLock<Collection<HistoryRecord>>,
    folders: RwLock<Collection<FavoriteFolder>>,
    resources: RwLock<Collection<FavoriteResource>>,
}

impl LocalStore {
    /// Opens the store in `path`, taking its directory lock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::StoreLocked`] if another process has the
    /// store open, or an error if the log cannot be read or is corrupt.
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        if dir.discard_stale_compaction()? {
            warn!(path = %path.display(), "removed leftover compaction file");
        }
        let backend = FileBackend::open(&dir.log_path())?;
        let store = Self::from_backend(Box::new(backend), config, Some(dir))?;
        info!(
            path = %path.display(),
            history = store.history_count(),
            resources = store.resource_count(None),
            "opened local store"
        );
        Ok(store)
    }

    /// Opens a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`LocalStore::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), Config::default())
    }

    /// Opens a store on an arbitrary backend, replaying whatever it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's contents are corrupt.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        Self::from_backend(backend, config, None)
    }

    fn from_backend(
        backend: Box<dyn StorageBackend>,
        config: Config,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let (log, frames) = RecordLog::open(backend)?;
        let mut history = Collection::new();
        let mut folders = Collection::new();
        let mut resources = Collection::new();

        for frame in &frames {
            match frame.collection {
                CollectionId::HISTORY => replay(&mut history, frame)?,
                CollectionId::FOLDERS => replay(&mut folders, frame)?,
                CollectionId::RESOURCES => replay(&mut resources, frame)?,
                other => warn!(collection = %other, key = frame.key, "skipping frame of unknown collection"),
            }
        }
        debug!(frames = frames.len(), "replayed record log");

        Ok(Self {
            config,
            dir,
            log: Mutex::new(log),
            history: RwLock::new(history),
            folders: RwLock::new(folders),
            resources: RwLock::new(resources),
        })
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ----- history -----

    /// Upserts one history record.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    pub fn put_history(&self, record: &HistoryRecord) -> CoreResult<()> {
        self.put_batch(&self.history, std::slice::from_ref(record))
            .map(|_| ())
    }

    /// Upserts a page of history records.
    ///
    /// # Errors
    ///
    /// Returns the first write error; records before it remain stored.
    pub fn put_history_many(&self, records: &[HistoryRecord]) -> CoreResult<usize> {
        self.put_batch(&self.history, records)
    }

    /// Looks up a history record.
    #[must_use]
    pub fn get_history(&self, id: u64) -> Option<HistoryRecord> {
        self.history.read().get(id).cloned()
    }

    /// Whether a history record exists.
    #[must_use]
    pub fn contains_history(&self, id: u64) -> bool {
        self.history.read().contains(id)
    }

    /// Deletes one history record. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the tombstone cannot be written.
    pub fn delete_history(&self, id: u64) -> CoreResult<bool> {
        Ok(self.delete_batch(&self.history, &[id])? == 1)
    }

    /// Deletes several history records and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns the first write error; deletions before it remain applied.
    pub fn delete_history_many(&self, ids: &[u64]) -> CoreResult<usize> {
        self.delete_batch(&self.history, ids)
    }

    /// Deletes every history record.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn clear_history(&self) -> CoreResult<usize> {
        let ids: Vec<u64> = self.history.read().keys().collect();
        let removed = self.delete_batch(&self.history, &ids)?;
        info!(removed, "cleared history");
        Ok(removed)
    }

    /// Number of history records.
    #[must_use]
    pub fn history_count(&self) -> usize {
        self.history.read().len()
    }

    /// Lazily walks history by `view_at` descending, starting strictly
    /// below `upper_exclusive` (or from the newest record).
    #[must_use]
    pub fn scan_history_desc(&self, upper_exclusive: Option<i64>) -> HistoryScan<'_> {
        HistoryScan {
            collection: &self.history,
            upper: upper_exclusive,
            cursor: None,
            exhausted: false,
        }
    }

    /// Every history record, newest first.
    #[must_use]
    pub fn all_history(&self) -> Vec<HistoryRecord> {
        let history = self.history.read();
        history
            .index()
            .iter_desc_below(None)
            .filter_map(|(_, id)| history.get(id).cloned())
            .collect()
    }

    // ----- favorites -----

    /// Upserts favorite folders.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn put_folders(&self, folders: &[FavoriteFolder]) -> CoreResult<usize> {
        self.put_batch(&self.folders, folders)
    }

    /// Folders sorted by their remote position, optionally only those
    /// owned by `mid`.
    #[must_use]
    pub fn folders(&self, mid: Option<u64>) -> Vec<FavoriteFolder> {
        let folders = self.folders.read();
        let mut list: Vec<FavoriteFolder> = match mid {
            Some(mid) => folders.by_index(mid).cloned().collect(),
            None => folders.values().cloned().collect(),
        };
        list.sort_by_key(|f| (f.index, f.id));
        list
    }

    /// Looks up a folder.
    #[must_use]
    pub fn get_folder(&self, id: u64) -> Option<FavoriteFolder> {
        self.folders.read().get(id).cloned()
    }

    /// Upserts favorite resources.
    ///
    /// # Errors
    ///
    /// Returns the first write error; resources before it remain stored.
    pub fn put_resources(&self, resources: &[FavoriteResource]) -> CoreResult<usize> {
        self.put_batch(&self.resources, resources)
    }

    /// Looks up a resource.
    #[must_use]
    pub fn get_resource(&self, id: u64) -> Option<FavoriteResource> {
        self.resources.read().get(id).cloned()
    }

    /// Resources whose stored `folder_id` is `folder_id`, unordered.
    #[must_use]
    pub fn resources_in_folder(&self, folder_id: u64) -> Vec<FavoriteResource> {
        self.resources.read().by_index(folder_id).cloned().collect()
    }

    /// Every resource, unordered.
    #[must_use]
    pub fn all_resources(&self) -> Vec<FavoriteResource> {
        self.resources.read().values().cloned().collect()
    }

    /// Deletes resources and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn delete_resources(&self, ids: &[u64]) -> CoreResult<usize> {
        self.delete_batch(&self.resources, ids)
    }

    /// Number of resources in `folder_id`, or in total.
    #[must_use]
    pub fn resource_count(&self, folder_id: Option<u64>) -> usize {
        let resources = self.resources.read();
        match folder_id {
            Some(folder) => resources.index().lookup(folder).count(),
            None => resources.len(),
        }
    }

    // ----- maintenance -----

    /// Rewrites the log with only live records.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or the new log cannot be
    /// written. On error the previous log stays in place.
    pub fn compact(&self) -> CoreResult<CompactionResult> {
        let mut log = self.log.lock();
        self.compact_locked(&mut log)
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the log size cannot be read.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let log = self.log.lock();
        Ok(StoreStats {
            history: self.history_count(),
            folders: self.folders.read().len(),
            resources: self.resources.read().len(),
            log_frames: log.frame_count(),
            log_bytes: log.size()?,
        })
    }

    fn live_records(&self) -> u64 {
        (self.history.read().len() + self.folders.read().len() + self.resources.read().len())
            as u64
    }

    fn put_batch<T: Record>(&self, slot: &RwLock<Collection<T>>, records: &[T]) -> CoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut log = self.log.lock();
        for record in records {
            let payload = to_cbor(record)?;
            log.put(T::COLLECTION, record.key(), payload)?;
            slot.write().upsert(record.clone());
        }
        self.finish_batch(&mut log)?;
        debug!(collection = %T::COLLECTION, written = records.len(), "stored batch");
        Ok(records.len())
    }

    fn delete_batch<T: Record>(&self, slot: &RwLock<Collection<T>>, keys: &[u64]) -> CoreResult<usize> {
        let mut log = self.log.lock();
        let mut removed = 0;
        for &key in keys {
            if !slot.read().contains(key) {
                continue;
            }
            log.delete(T::COLLECTION, key)?;
            slot.write().remove(key);
            removed += 1;
        }
        if removed > 0 {
            self.finish_batch(&mut log)?;
            debug!(collection = %T::COLLECTION, removed, "deleted batch");
        }
        Ok(removed)
    }

    fn finish_batch(&self, log: &mut RecordLog) -> CoreResult<()> {
        log.flush(self.config.sync_on_write)?;
        if self
            .config
            .should_compact(log.frame_count(), self.live_records())
        {
            self.compact_locked(log)?;
        }
        Ok(())
    }

    fn compact_locked(&self, log: &mut RecordLog) -> CoreResult<CompactionResult> {
        let frames = log.scan()?;
        let (live, result) = Compactor::new().compact(frames)?;

        match &self.dir {
            Some(dir) => {
                let mut fresh = FileBackend::open(&dir.compaction_path())?;
                fresh.truncate(0)?;
                for record in &live {
                    fresh.append(&record.encode())?;
                }
                fresh.sync()?;
                drop(fresh);
                dir.install_compacted()?;
                let backend = FileBackend::open(&dir.log_path())?;
                log.install(Box::new(backend), live.len() as u64);
            }
            None => log.rewrite_in_place(&live)?,
        }

        info!(
            input = result.input_records,
            output = result.output_records,
            bytes_saved = result.bytes_saved,
            "compacted record log"
        );
        Ok(result)
    }
}

fn replay<T: Record>(collection: &mut Collection<T>, frame: &LogRecord) -> CoreResult<()> {
    if frame.is_tombstone() {
        collection.remove(frame.key);
    } else {
        let record: T = from_cbor(&frame.payload)?;
        collection.upsert(record);
    }
    Ok(())
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("dir", &self.dir.as_ref().map(StoreDir::path))
            .field("history", &self.history_count())
            .finish_non_exhaustive()
    }
}

/// Lazy descending walk over history, produced by
/// [`LocalStore::scan_history_desc`].
///
/// Each step takes the history read lock only long enough to find the next
/// entry, so writes can interleave with a long scan. Records written behind
/// the cursor are not revisited.
pub struct HistoryScan<'a> {
    collection: &'a RwLock<Collection<HistoryRecord>>,
    upper: Option<i64>,
    cursor: Option<(i64, u64)>,
    exhausted: bool,
}

impl HistoryScan<'_> {
    fn next_pair(&self, history: &Collection<HistoryRecord>) -> Option<(i64, u64)> {
        match self.cursor {
            Some(pair) => history.index().prev_before(Some(pair)),
            None => history.index().iter_desc_below(self.upper).next(),
        }
    }

    /// Whether at least one more entry is left to scan.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        !self.exhausted && self.next_pair(&self.collection.read()).is_some()
    }
}

impl Iterator for HistoryScan<'_> {
    type Item = HistoryRecord;

    fn next(&mut self) -> Option<HistoryRecord> {
        if self.exhausted {
            return None;
        }
        let history = self.collection.read();
        loop {
            let Some(pair) = self.next_pair(&history) else {
                self.exhausted = true;
                return None;
            };
            self.cursor = Some(pair);
            if let Some(record) = history.get(pair.1) {
                return Some(record.clone());
            }
        }
    }
}
