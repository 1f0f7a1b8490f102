//! Delete command implementation.

use super::{open_service, CliResult, Credentials};
use bilisync_sync_engine::SyncConfig;
use std::path::Path;

/// Deletes one history record.
pub async fn run(path: &Path, credentials: Credentials, id: u64) -> CliResult<()> {
    let service = open_service(path, credentials, &SyncConfig::new())?;
    if service.delete_history_item(id).await? {
        println!("✓ Deleted history record {id}");
        Ok(())
    } else {
        Err(format!("No history record with id {id}").into())
    }
}
