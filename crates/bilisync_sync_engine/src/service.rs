//! The operations exposed to user-facing surfaces.
//!
//! Sync and backup entry points never return `Err`: they report a
//! [`SyncOutcome`] carrying either a message or the error text.

use crate::cloud::BackupTransport;
use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::settings::keys;
use crate::state::SyncSnapshot;
use bilisync_core::{
    now_millis, BackupData, FavoriteFolder, FavoriteResource, FavoritesFilter, HistoryFilter,
    HistoryRecord, LocalStore, QueryPage,
};
use bilisync_remote::HistoryApi;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result shape handed to user-facing surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Summary on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    /// A successful outcome.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
        }
    }

    fn from_result<T>(result: SyncResult<T>, describe: impl FnOnce(T) -> String) -> Self {
        match result {
            Ok(value) => Self::ok(describe(value)),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Facade over the store, coordinator and backup transport.
pub struct SyncService {
    store: Arc<LocalStore>,
    coordinator: Arc<SyncCoordinator>,
    history_remote: Arc<dyn HistoryApi>,
    backup: Option<Arc<dyn BackupTransport>>,
}

impl SyncService {
    /// Creates a service without cloud backup.
    pub fn new(
        store: Arc<LocalStore>,
        coordinator: Arc<SyncCoordinator>,
        history_remote: Arc<dyn HistoryApi>,
    ) -> Self {
        Self {
            store,
            coordinator,
            history_remote,
            backup: None,
        }
    }

    /// Adds a cloud backup transport.
    pub fn with_backup(mut self, backup: Arc<dyn BackupTransport>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    // ----- sync -----

    /// Runs a history sync; see [`SyncCoordinator::run_history`].
    pub async fn run_history_sync(&self, force_full: bool) -> SyncOutcome {
        let result = self.coordinator.run_history(force_full).await;
        SyncOutcome::from_result(result, |report| {
            format!(
                "{} history sync stored {} records from {} pages",
                report.mode, report.written, report.pages
            )
        })
    }

    /// Runs a favorites sync; see [`SyncCoordinator::run_favorites`].
    pub async fn run_favorites_sync(&self) -> SyncOutcome {
        let result = self.coordinator.run_favorites().await;
        SyncOutcome::from_result(result, |report| {
            let mut message = format!(
                "synced {} folders, stored {} resources, removed {}",
                report.folders, report.resources_written, report.resources_removed
            );
            if !report.failed_folders.is_empty() {
                message.push_str(&format!(", {} folders failed", report.failed_folders.len()));
            }
            message
        })
    }

    /// The sync flags, countdowns and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn status(&self) -> SyncResult<SyncSnapshot> {
        self.coordinator.state().snapshot()
    }

    // ----- history -----

    /// Deletes a history record locally, then from the remote if
    /// [`keys::SYNC_DELETE_FROM_REMOTE`] is on.
    ///
    /// A remote failure is logged and does not undo the local delete.
    /// Returns false if the record did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the local delete fails.
    pub async fn delete_history_item(&self, id: u64) -> SyncResult<bool> {
        let Some(record) = self.store.get_history(id) else {
            return Ok(false);
        };
        self.store.delete_history(id)?;
        info!(id, "deleted history record");

        let mirror = match self
            .coordinator
            .state()
            .settings()
            .get_or(keys::SYNC_DELETE_FROM_REMOTE, true)
        {
            Ok(mirror) => mirror,
            Err(e) => {
                warn!(id, error = %e, "failed to read delete setting, not deleting remotely");
                false
            }
        };
        if mirror {
            if let Err(e) = self.history_remote.delete_history(&record.business, id).await {
                warn!(id, business = %record.business, error = %e, "remote history delete failed");
            }
        }
        Ok(true)
    }

    /// See [`LocalStore::query_history`].
    pub fn query_history(
        &self,
        after_view_at: Option<i64>,
        page_size: usize,
        filter: &HistoryFilter,
    ) -> QueryPage<HistoryRecord> {
        self.store.query_history(after_view_at, page_size, filter)
    }

    /// Number of stored history records.
    pub fn total_history_count(&self) -> usize {
        self.store.history_count()
    }

    // ----- favorites -----

    /// See [`LocalStore::query_favorites`].
    pub fn query_favorites(
        &self,
        folder_id: Option<u64>,
        filter: &FavoritesFilter,
        after_item: Option<u64>,
        limit: usize,
    ) -> QueryPage<FavoriteResource> {
        self.store
            .query_favorites(folder_id, filter, after_item, limit)
    }

    /// Stored folders, optionally of one account, in remote order.
    pub fn favorite_folders(&self, mid: Option<u64>) -> Vec<FavoriteFolder> {
        self.store.folders(mid)
    }

    /// Number of stored resources in one folder, or in all.
    pub fn favorite_resource_count(&self, folder_id: Option<u64>) -> usize {
        self.store.resource_count(folder_id)
    }

    // ----- backup -----

    /// Snapshots local history.
    pub fn create_backup_data(&self) -> BackupData {
        self.store.create_backup_data()
    }

    /// Replaces local history with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is invalid or a write fails.
    pub fn restore_from_backup_data(&self, data: &BackupData) -> SyncResult<usize> {
        self.store
            .restore_from_backup_data(data)
            .map_err(|e| SyncError::backup(e.to_string()))
    }

    /// Uploads a snapshot of local history.
    pub async fn upload_backup(&self) -> SyncOutcome {
        SyncOutcome::from_result(self.try_upload().await, |count| {
            format!("uploaded {count} history records")
        })
    }

    /// Downloads the remote snapshot and restores it.
    pub async fn download_backup(&self) -> SyncOutcome {
        SyncOutcome::from_result(self.try_download().await, |count| {
            format!("restored {count} history records")
        })
    }

    /// Checks that the cloud backup location answers, reporting whether a
    /// snapshot is already stored there.
    pub async fn test_backup_connection(&self) -> SyncOutcome {
        let result = match self.transport() {
            Ok(transport) => transport.check_exists().await,
            Err(e) => Err(e),
        };
        SyncOutcome::from_result(result, |exists| {
            if exists {
                "connected, a backup is stored".to_string()
            } else {
                "connected, no backup stored yet".to_string()
            }
        })
    }

    fn transport(&self) -> SyncResult<&Arc<dyn BackupTransport>> {
        self.backup
            .as_ref()
            .ok_or_else(|| SyncError::transport("cloud backup is not configured"))
    }

    async fn try_upload(&self) -> SyncResult<usize> {
        let transport = self.transport()?;
        let data = self.create_backup_data();
        transport.upload(&data).await?;
        self.coordinator
            .state()
            .settings()
            .set(keys::LAST_CLOUD_UPLOAD, &now_millis())?;
        Ok(data.count)
    }

    async fn try_download(&self) -> SyncResult<usize> {
        let transport = self.transport()?;
        let data = transport
            .download()
            .await?
            .ok_or_else(|| SyncError::backup("remote backup does not exist"))?;
        let restored = self.restore_from_backup_data(&data)?;
        self.coordinator
            .state()
            .settings()
            .set(keys::LAST_CLOUD_DOWNLOAD, &now_millis())?;
        Ok(restored)
    }
}
