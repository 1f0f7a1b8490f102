//! Log compaction.
//!
//! Compaction keeps the latest frame for every `(collection, key)` and drops
//! tombstones, so the output replays to the same store state with fewer
//! frames. Output keeps sequence order, so replaying it reproduces the
//! original write order within each collection.

use crate::error::CoreResult;
use crate::log::record::LogRecord;
use std::collections::HashMap;

/// Statistics of one compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionResult {
    /// Frames read.
    pub input_records: usize,
    /// Frames written.
    pub output_records: usize,
    /// Tombstones dropped.
    pub tombstones_removed: usize,
    /// Superseded versions dropped.
    pub obsolete_versions_removed: usize,
    /// Input size minus output size.
    pub bytes_saved: usize,
}

/// Deduplicates log frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct Compactor;

impl Compactor {
    /// Creates a compactor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compacts `records` into the live set.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` leaves room for payload validation.
    pub fn compact(
        &self,
        records: Vec<LogRecord>,
    ) -> CoreResult<(Vec<LogRecord>, CompactionResult)> {
        let input_records = records.len();
        let input_size: usize = records.iter().map(LogRecord::encoded_size).sum();

        let mut latest: HashMap<(u32, u64), LogRecord> = HashMap::with_capacity(records.len());
        let mut obsolete = 0usize;

        for record in records {
            let key = (record.collection.as_u32(), record.key);
            let newer = latest
                .get(&key)
                .map_or(true, |existing| record.sequence > existing.sequence);
            if newer {
                if latest.insert(key, record).is_some() {
                    obsolete += 1;
                }
            } else {
                obsolete += 1;
            }
        }

        let mut tombstones_removed = 0usize;
        let mut output: Vec<LogRecord> = latest
            .into_values()
            .filter(|record| {
                if record.is_tombstone() {
                    tombstones_removed += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        output.sort_by_key(|record| record.sequence);

        let output_size: usize = output.iter().map(LogRecord::encoded_size).sum();
        let result = CompactionResult {
            input_records,
            output_records: output.len(),
            tombstones_removed,
            obsolete_versions_removed: obsolete,
            bytes_saved: input_size.saturating_sub(output_size),
        };
        Ok((output, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionId, SequenceNumber};

    fn put(collection: CollectionId, key: u64, payload: u8, seq: u64) -> LogRecord {
        LogRecord::put(collection, key, vec![payload], SequenceNumber::new(seq))
    }

    #[test]
    fn latest_version_survives() {
        let records = vec![
            put(CollectionId::HISTORY, 1, 1, 1),
            put(CollectionId::HISTORY, 1, 2, 2),
            put(CollectionId::HISTORY, 2, 3, 3),
        ];
        let (out, stats) = Compactor::new().compact(records).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].payload, vec![2]);
        assert_eq!(stats.obsolete_versions_removed, 1);
        assert!(stats.bytes_saved > 0);
    }

    #[test]
    fn tombstoned_keys_disappear() {
        let records = vec![
            put(CollectionId::RESOURCES, 7, 1, 1),
            LogRecord::tombstone(CollectionId::RESOURCES, 7, SequenceNumber::new(2)),
            put(CollectionId::RESOURCES, 8, 1, 3),
        ];
        let (out, stats) = Compactor::new().compact(records).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, 8);
        assert_eq!(stats.tombstones_removed, 1);
    }

    #[test]
    fn same_key_in_different_collections_is_distinct() {
        let records = vec![
            put(CollectionId::FOLDERS, 5, 1, 1),
            put(CollectionId::RESOURCES, 5, 2, 2),
        ];
        let (out, _) = Compactor::new().compact(records).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn output_is_in_sequence_order() {
        let records = vec![
            put(CollectionId::HISTORY, 3, 0, 1),
            put(CollectionId::HISTORY, 1, 0, 2),
            put(CollectionId::HISTORY, 2, 0, 3),
            put(CollectionId::HISTORY, 3, 0, 4),
        ];
        let (out, _) = Compactor::new().compact(records).unwrap();
        let keys: Vec<u64> = out.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }
}
