//! Backup and restore commands.
//!
//! Snapshots hold history only, as the JSON document shared with cloud
//! backups. Importing replaces local history.

use super::{open_service, open_store, report, CliResult, Credentials, WebDavArgs};
use bilisync_core::BackupData;
use bilisync_sync_engine::SyncConfig;
use std::path::Path;
use tracing::info;

/// Writes a history snapshot to `output_path`.
pub fn export(db_path: &Path, output_path: &Path) -> CliResult<()> {
    let store = open_store(db_path)?;
    let data = store.create_backup_data();
    data.write_to(output_path)?;

    println!("✓ Backup created successfully");
    println!("  Path: {:?}", output_path);
    println!("  Records: {}", data.count);
    println!("  Timestamp: {}", super::format_millis(data.timestamp));
    Ok(())
}

/// Replaces local history with the snapshot in `input_path`.
pub fn import(db_path: &Path, input_path: &Path) -> CliResult<()> {
    info!("Restoring history from {:?}", input_path);
    let data = BackupData::read_from(input_path)?;
    let store = open_store(db_path)?;
    let restored = store.restore_from_backup_data(&data)?;

    println!("✓ Restore completed successfully");
    println!("  Records: {restored}");
    println!("  Snapshot taken: {}", super::format_millis(data.timestamp));
    Ok(())
}

/// Uploads a history snapshot to WebDAV.
pub async fn upload(db_path: &Path, webdav: &WebDavArgs) -> CliResult<()> {
    let service = open_service(db_path, Credentials::default(), &SyncConfig::new())?
        .with_backup(webdav.transport()?);
    report(service.upload_backup().await)
}

/// Replaces local history with the WebDAV snapshot.
pub async fn download(db_path: &Path, webdav: &WebDavArgs) -> CliResult<()> {
    let service = open_service(db_path, Credentials::default(), &SyncConfig::new())?
        .with_backup(webdav.transport()?);
    report(service.download_backup().await)
}

/// Checks the WebDAV location without transferring a snapshot.
pub async fn test(db_path: &Path, webdav: &WebDavArgs) -> CliResult<()> {
    let service = open_service(db_path, Credentials::default(), &SyncConfig::new())?
        .with_backup(webdav.transport()?);
    report(service.test_backup_connection().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bilisync_core::HistoryRecord;

    #[test]
    fn export_then_import_into_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let target = dir.path().join("target");
        let file = dir.path().join("backup.json");

        {
            let store = open_store(&source).unwrap();
            store
                .put_history_many(&[
                    HistoryRecord {
                        id: 1,
                        title: "first".to_string(),
                        view_at: 200,
                        ..Default::default()
                    },
                    HistoryRecord {
                        id: 2,
                        title: "second".to_string(),
                        view_at: 100,
                        ..Default::default()
                    },
                ])
                .unwrap();
        }
        export(&source, &file).unwrap();
        import(&target, &file).unwrap();

        let store = open_store(&target).unwrap();
        assert_eq!(store.history_count(), 2);
        assert_eq!(store.get_history(1).unwrap().title, "first");
    }

    #[test]
    fn import_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(import(&dir.path().join("store"), &dir.path().join("missing.json")).is_err());
    }
}
