//! Durable key/value settings.
//!
//! Sync flags, countdowns, intervals and timestamps are stored as JSON
//! values under the keys in [`keys`]. Only [`SyncStateMachine`] writes the
//! sync keys; the service reads user preferences such as
//! [`keys::SYNC_DELETE_FROM_REMOTE`].
//!
//! [`SyncStateMachine`]: crate::SyncStateMachine

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Setting keys.
pub mod keys {
    /// A history run holds the lock.
    pub const HISTORY_SYNC_IN_PROGRESS: &str = "history_sync_in_progress";
    /// A favorites run holds the lock.
    pub const FAVORITES_SYNC_IN_PROGRESS: &str = "favorites_sync_in_progress";
    /// Ticks between scheduled history runs.
    pub const HISTORY_SYNC_INTERVAL: &str = "history_sync_interval";
    /// Ticks between scheduled favorites runs.
    pub const FAVORITES_SYNC_INTERVAL: &str = "favorites_sync_interval";
    /// Ticks left until the next scheduled history run.
    pub const HISTORY_TICKS_UNTIL_NEXT_SYNC: &str = "history_minutes_until_next_sync";
    /// Ticks left until the next scheduled favorites run.
    pub const FAVORITES_TICKS_UNTIL_NEXT_SYNC: &str = "favorites_minutes_until_next_sync";
    /// A full history run has completed at least once.
    pub const HAS_COMPLETED_FULL_HISTORY_SYNC: &str = "has_completed_full_history_sync";
    /// Mirror local history deletes to the remote.
    pub const SYNC_DELETE_FROM_REMOTE: &str = "sync_delete_from_remote";
    /// Unix milliseconds of the last successful history run.
    pub const LAST_HISTORY_SYNC: &str = "last_history_sync";
    /// Unix milliseconds of the last successful favorites run.
    pub const LAST_FAVORITES_SYNC: &str = "last_favorites_sync";
    /// Unix milliseconds of the last backup upload.
    pub const LAST_CLOUD_UPLOAD: &str = "last_cloud_upload";
    /// Unix milliseconds of the last backup download.
    pub const LAST_CLOUD_DOWNLOAD: &str = "last_cloud_download";
}

/// A durable bag of JSON values.
pub trait SettingsStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> SyncResult<Option<Value>>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: Value) -> SyncResult<()>;

    /// Removes `key`. Returns true if it was present.
    fn remove(&self, key: &str) -> SyncResult<bool>;
}

/// Typed access to a [`SettingsStore`].
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    /// Wraps a store.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Settings held in memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySettings::new()))
    }

    /// Reads `key`, or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value has the wrong type.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> SyncResult<T> {
        match self.store.get(key)? {
            None | Some(Value::Null) => Ok(default),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::settings(format!("{key}: {e}"))),
        }
    }

    /// Reads `key`, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value has the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.store.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SyncError::settings(format!("{key}: {e}"))),
        }
    }

    /// Writes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or stored.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> SyncResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SyncError::settings(format!("{key}: {e}")))?;
        self.store.set(key, value)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove(&self, key: &str) -> SyncResult<bool> {
        self.store.remove(key)
    }
}

/// Settings kept in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemorySettings {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> SyncResult<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> SyncResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<bool> {
        Ok(self.values.write().remove(key).is_some())
    }
}

/// Settings persisted as one JSON object.
///
/// Every write rewrites the whole file through a temporary file and a
/// rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileSettings {
    /// Opens the settings file, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SyncError::settings(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SyncError::settings(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, Value>) -> SyncResult<()> {
        let temp_path = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let data = serde_json::to_vec_pretty(values)?;
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, &self.path)
        };
        write().map_err(|e| SyncError::settings(format!("{}: {e}", self.path.display())))
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> SyncResult<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> SyncResult<()> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value);
        if let Err(e) = self.persist(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<bool> {
        let mut values = self.values.write();
        let Some(previous) = values.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&values) {
            values.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn typed_access_with_defaults() {
        let settings = Settings::in_memory();
        assert!(settings.get_or(keys::SYNC_DELETE_FROM_REMOTE, true).unwrap());
        assert_eq!(settings.get::<i64>(keys::LAST_HISTORY_SYNC).unwrap(), None);

        settings.set(keys::HISTORY_SYNC_INTERVAL, &15u32).unwrap();
        assert_eq!(settings.get_or(keys::HISTORY_SYNC_INTERVAL, 1u32).unwrap(), 15);

        assert!(settings.remove(keys::HISTORY_SYNC_INTERVAL).unwrap());
        assert!(!settings.remove(keys::HISTORY_SYNC_INTERVAL).unwrap());
    }

    #[test]
    fn wrong_type_is_an_error() {
        let settings = Settings::in_memory();
        settings.set(keys::HISTORY_SYNC_INTERVAL, &"soon").unwrap();
        assert!(matches!(
            settings.get_or(keys::HISTORY_SYNC_INTERVAL, 1u32),
            Err(SyncError::Settings(_))
        ));
    }

    #[test]
    fn file_settings_survive_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        {
            let store = JsonFileSettings::open(&path).unwrap();
            let settings = Settings::new(Arc::new(store));
            settings.set(keys::HAS_COMPLETED_FULL_HISTORY_SYNC, &true).unwrap();
            settings.set(keys::LAST_HISTORY_SYNC, &1_700_000_000_000i64).unwrap();
        }

        let settings = Settings::new(Arc::new(JsonFileSettings::open(&path).unwrap()));
        assert!(settings
            .get_or(keys::HAS_COMPLETED_FULL_HISTORY_SYNC, false)
            .unwrap());
        assert_eq!(
            settings.get::<i64>(keys::LAST_HISTORY_SYNC).unwrap(),
            Some(1_700_000_000_000)
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            JsonFileSettings::open(&path),
            Err(SyncError::Settings(_))
        ));
    }

    #[test]
    fn failed_write_keeps_memory_consistent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing-dir").join("settings.json");
        let store = JsonFileSettings::open(&path).unwrap();
        assert!(store.set("k", Value::Bool(true)).is_err());
        assert_eq!(store.get("k").unwrap(), None);
    }
}
