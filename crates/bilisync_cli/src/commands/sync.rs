//! Manual sync commands.

use super::{open_service, report, CliResult, Credentials};
use bilisync_sync_engine::SyncConfig;
use std::path::Path;
use tracing::info;

/// Runs a history sync. The first run is full whatever `full` says.
pub async fn history(path: &Path, credentials: Credentials, full: bool) -> CliResult<()> {
    let service = open_service(path, credentials, &SyncConfig::new())?;
    info!(full, "starting history sync");
    report(service.run_history_sync(full).await)
}

/// Runs a favorites sync.
pub async fn favorites(path: &Path, credentials: Credentials) -> CliResult<()> {
    let service = open_service(path, credentials, &SyncConfig::new())?;
    info!("starting favorites sync");
    report(service.run_favorites_sync().await)
}
