//! History backup snapshots.
//!
//! A backup is a JSON document holding every history record:
//!
//! ```json
//! { "version": 1, "timestamp": 1709251200000, "count": 2, "history": [ ... ] }
//! ```
//!
//! The same document is written to local files and uploaded to cloud
//! storage. Restoring clears local history and inserts the snapshot.

use crate::error::{CoreError, CoreResult};
use crate::model::HistoryRecord;
use crate::store::LocalStore;
use crate::types::now_millis;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Current backup format version.
pub const BACKUP_VERSION: u32 = 1;

/// A point-in-time snapshot of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupData {
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken, Unix milliseconds.
    pub timestamp: i64,
    /// Number of records in `history`.
    pub count: usize,
    /// The records, newest first.
    pub history: Vec<HistoryRecord>,
}

impl BackupData {
    /// Wraps `history` in a snapshot stamped with the current time.
    #[must_use]
    pub fn new(history: Vec<HistoryRecord>) -> Self {
        Self {
            version: BACKUP_VERSION,
            timestamp: now_millis(),
            count: history.len(),
            history,
        }
    }

    /// Checks the version and record count.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported version or a count that does
    /// not match the records.
    pub fn validate(&self) -> CoreResult<()> {
        if self.version != BACKUP_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported backup version {}",
                self.version
            )));
        }
        if self.count != self.history.len() {
            return Err(CoreError::invalid_format(format!(
                "backup claims {} records but holds {}",
                self.count,
                self.history.len()
            )));
        }
        Ok(())
    }

    /// Serializes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses and validates a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_json(bytes: &[u8]) -> CoreResult<Self> {
        let data: Self = serde_json::from_slice(bytes)?;
        data.validate()?;
        Ok(data)
    }

    /// Writes the snapshot to a file, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> CoreResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads and validates a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn read_from(path: &Path) -> CoreResult<Self> {
        let data: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        data.validate()?;
        Ok(data)
    }
}

impl LocalStore {
    /// Snapshots every history record.
    #[must_use]
    pub fn create_backup_data(&self) -> BackupData {
        BackupData::new(self.all_history())
    }

    /// Replaces local history with the snapshot's records.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is invalid or a write fails. A write
    /// failure can leave history partially restored.
    pub fn restore_from_backup_data(&self, data: &BackupData) -> CoreResult<usize> {
        data.validate()?;
        let cleared = self.clear_history()?;
        let restored = self.put_history_many(&data.history)?;
        info!(cleared, restored, snapshot = data.timestamp, "restored history backup");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Business;
    use tempfile::tempdir;

    fn sample() -> Vec<HistoryRecord> {
        (1..=3)
            .map(|i| HistoryRecord {
                id: i,
                business: if i == 2 { Business::Live } else { Business::Archive },
                bvid: format!("BV{i}"),
                title: format!("title {i}"),
                view_at: 1_700_000_000 + i as i64,
                synced_at: 1_700_000_000_000,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn snapshot_restores_into_empty_store() {
        let source = LocalStore::open_in_memory().unwrap();
        source.put_history_many(&sample()).unwrap();
        let backup = source.create_backup_data();
        assert_eq!(backup.count, 3);

        let target = LocalStore::open_in_memory().unwrap();
        let bytes = backup.to_json().unwrap();
        let parsed = BackupData::from_json(&bytes).unwrap();
        assert_eq!(target.restore_from_backup_data(&parsed).unwrap(), 3);

        assert_eq!(target.all_history(), source.all_history());
    }

    #[test]
    fn restore_replaces_existing_history() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put_history(&HistoryRecord {
                id: 99,
                ..Default::default()
            })
            .unwrap();

        store
            .restore_from_backup_data(&BackupData::new(sample()))
            .unwrap();
        assert!(!store.contains_history(99));
        assert_eq!(store.history_count(), 3);
    }

    #[test]
    fn rejects_bad_documents() {
        let mut data = BackupData::new(sample());
        data.count = 7;
        assert!(data.validate().is_err());

        data.count = 3;
        data.version = 2;
        assert!(matches!(
            data.validate(),
            Err(CoreError::InvalidFormat { .. })
        ));

        assert!(matches!(
            BackupData::from_json(b"{\"version\":1}"),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn reads_documents_without_local_fields() {
        let json = r#"{"version":1,"timestamp":1,"count":1,"history":[
            {"id":5,"business":"pgc","bvid":"","title":"ep","cover":"c","view_at":10,
             "author_name":"a","author_mid":1,"tag_name":"番剧"}]}"#;
        let data = BackupData::from_json(json.as_bytes()).unwrap();
        assert_eq!(data.history[0].business, Business::Pgc);
        assert_eq!(data.history[0].synced_at, 0);
    }

    #[test]
    fn file_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("backup.json");
        let data = BackupData::new(sample());
        data.write_to(&path).unwrap();
        assert_eq!(BackupData::read_from(&path).unwrap(), data);
    }
}
