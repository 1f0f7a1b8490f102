//! Long-running scheduler.

use super::{open_service, CliResult, Credentials};
use bilisync_sync_engine::{Scheduler, SyncConfig, SyncKind};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Options of the `daemon` command.
pub struct DaemonOptions {
    /// Seconds between ticks.
    pub tick_seconds: u64,
    /// New history interval in ticks.
    pub history_interval: Option<u32>,
    /// New favorites interval in ticks.
    pub favorites_interval: Option<u32>,
}

/// Runs scheduled syncs until Ctrl-C.
pub async fn run(path: &Path, credentials: Credentials, options: DaemonOptions) -> CliResult<()> {
    let config = SyncConfig::new().with_tick_period(Duration::from_secs(options.tick_seconds.max(1)));
    let service = open_service(path, credentials, &config)?;
    let coordinator = service.coordinator().clone();
    let state = coordinator.state();

    let recovered = state.recover_stale_locks()?;
    if !recovered.is_empty() {
        warn!(?recovered, "cleared sync locks left by a previous process");
    }
    if let Some(ticks) = options.history_interval {
        state.set_interval(SyncKind::History, ticks)?;
    }
    if let Some(ticks) = options.favorites_interval {
        state.set_interval(SyncKind::Favorites, ticks)?;
    }

    let handle = Scheduler::new(coordinator.clone(), config.tick_period).spawn();
    info!(
        tick_seconds = config.tick_period.as_secs(),
        history_interval = state.interval(SyncKind::History)?,
        favorites_interval = state.interval(SyncKind::Favorites)?,
        "daemon running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
