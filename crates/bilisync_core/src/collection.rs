//! In-memory collections rebuilt from the record log.

use crate::index::BTreeIndex;
use crate::model::{FavoriteFolder, FavoriteResource, HistoryRecord};
use crate::types::CollectionId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// A record type stored in its own collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection id written into log frames.
    const COLLECTION: CollectionId;

    /// Secondary index key type.
    type IndexKey: Ord + Copy + Send + Sync + std::fmt::Debug;

    /// Primary key.
    fn key(&self) -> u64;

    /// Secondary index key.
    fn index_key(&self) -> Self::IndexKey;
}

impl Record for HistoryRecord {
    const COLLECTION: CollectionId = CollectionId::HISTORY;
    type IndexKey = i64;

    fn key(&self) -> u64 {
        self.id
    }

    fn index_key(&self) -> i64 {
        self.view_at
    }
}

impl Record for FavoriteFolder {
    const COLLECTION: CollectionId = CollectionId::FOLDERS;
    type IndexKey = u64;

    fn key(&self) -> u64 {
        self.id
    }

    fn index_key(&self) -> u64 {
        self.mid
    }
}

impl Record for FavoriteResource {
    const COLLECTION: CollectionId = CollectionId::RESOURCES;
    type IndexKey = u64;

    fn key(&self) -> u64 {
        self.id
    }

    fn index_key(&self) -> u64 {
        self.folder_id
    }
}

/// Primary map plus secondary index for one record type.
#[derive(Debug)]
pub struct Collection<T: Record> {
    records: HashMap<u64, T>,
    index: BTreeIndex<T::IndexKey>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            index: BTreeIndex::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record, moving its index entry if the index
    /// key changed. Returns the replaced record.
    pub fn upsert(&mut self, record: T) -> Option<T> {
        let key = record.key();
        let index_key = record.index_key();
        let previous = self.records.insert(key, record);
        if let Some(old) = &previous {
            self.index.remove(old.index_key(), key);
        }
        self.index.insert(index_key, key);
        previous
    }

    /// Removes a record by primary key.
    pub fn remove(&mut self, key: u64) -> Option<T> {
        let removed = self.records.remove(&key)?;
        self.index.remove(removed.index_key(), key);
        Some(removed)
    }

    /// Looks up a record.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&T> {
        self.records.get(&key)
    }

    /// Whether a record exists.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.records.contains_key(&key)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All primary keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.records.keys().copied()
    }

    /// All records, in no particular order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.records.values()
    }

    /// The secondary index.
    #[must_use]
    pub fn index(&self) -> &BTreeIndex<T::IndexKey> {
        &self.index
    }

    /// Records whose index key equals `key`, ordered by primary key.
    pub fn by_index(&self, key: T::IndexKey) -> impl Iterator<Item = &T> + '_ {
        self.index
            .lookup(key)
            .filter_map(move |primary| self.records.get(&primary))
    }
}
