//! Sync coordinator.
//!
//! The entry point for both manual and scheduled runs. Every run holds the
//! lease for its kind; a second run of the same kind is refused with
//! [`SyncError::Busy`] before any request is made. History and favorites
//! runs do not block each other.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::favorites::{FavoritesSyncEngine, FavoritesSyncReport};
use crate::history::{HistorySyncEngine, HistorySyncMode, HistorySyncReport};
use crate::state::{SyncKind, SyncLease, SyncStateMachine, TickDecision};
use bilisync_core::LocalStore;
use bilisync_remote::{FavoritesApi, HistoryApi};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a completed run of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// A history run.
    History(HistorySyncReport),
    /// A favorites run.
    Favorites(FavoritesSyncReport),
}

/// What a scheduler tick did for one kind.
#[derive(Debug)]
pub enum TickOutcome {
    /// The countdown has not run out.
    Waiting {
        /// Ticks left.
        remaining: i64,
    },
    /// A run of this kind was already in progress.
    Skipped,
    /// A run happened.
    Ran(SyncResult<RunReport>),
}

/// Runs sync engines under the state machine's locks.
pub struct SyncCoordinator {
    state: Arc<SyncStateMachine>,
    history: HistorySyncEngine,
    favorites: FavoritesSyncEngine,
}

impl SyncCoordinator {
    /// Creates a coordinator over one store and remote.
    pub fn new<R>(
        store: Arc<LocalStore>,
        remote: Arc<R>,
        state: Arc<SyncStateMachine>,
        config: SyncConfig,
    ) -> Self
    where
        R: HistoryApi + FavoritesApi + 'static,
    {
        Self::with_engines(
            state,
            HistorySyncEngine::new(store.clone(), remote.clone(), config.clone()),
            FavoritesSyncEngine::new(store, remote, config),
        )
    }

    /// Creates a coordinator from prebuilt engines.
    pub fn with_engines(
        state: Arc<SyncStateMachine>,
        history: HistorySyncEngine,
        favorites: FavoritesSyncEngine,
    ) -> Self {
        Self {
            state,
            history,
            favorites,
        }
    }

    /// The state machine runs are coordinated through.
    pub fn state(&self) -> &Arc<SyncStateMachine> {
        &self.state
    }

    /// Runs a history sync now.
    ///
    /// An incremental request is escalated to a full run until a full run
    /// has completed once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Busy`] if a history run is in progress, or the
    /// run's error.
    pub async fn run_history(&self, force_full: bool) -> SyncResult<HistorySyncReport> {
        let lease = self
            .state
            .try_acquire(SyncKind::History)?
            .ok_or(SyncError::Busy(SyncKind::History))?;
        let result = self.history_under(force_full).await;
        finish(lease, result)
    }

    /// Runs a favorites sync now.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Busy`] if a favorites run is in progress, or the
    /// run's error.
    pub async fn run_favorites(&self) -> SyncResult<FavoritesSyncReport> {
        let lease = self
            .state
            .try_acquire(SyncKind::Favorites)?
            .ok_or(SyncError::Busy(SyncKind::Favorites))?;
        let result = self.favorites_under().await;
        finish(lease, result)
    }

    /// Advances the countdown for `kind` and runs when it runs out.
    ///
    /// Scheduled history runs are incremental.
    ///
    /// # Errors
    ///
    /// Returns an error only if the settings store fails; run errors are
    /// reported in [`TickOutcome::Ran`].
    pub async fn tick(&self, kind: SyncKind) -> SyncResult<TickOutcome> {
        let lease = match self.state.tick(kind)? {
            TickDecision::Wait { remaining } => return Ok(TickOutcome::Waiting { remaining }),
            TickDecision::Busy => return Ok(TickOutcome::Skipped),
            TickDecision::Run(lease) => lease,
        };
        info!(%kind, "scheduled sync starting");
        let result = match kind {
            SyncKind::History => finish(lease, self.history_under(false).await).map(RunReport::History),
            SyncKind::Favorites => {
                finish(lease, self.favorites_under().await).map(RunReport::Favorites)
            }
        };
        if let Err(e) = &result {
            warn!(%kind, error = %e, "scheduled sync failed");
        }
        Ok(TickOutcome::Ran(result))
    }

    async fn history_under(&self, force_full: bool) -> SyncResult<HistorySyncReport> {
        let mode = if force_full || !self.state.has_completed_full_history_sync()? {
            HistorySyncMode::Full
        } else {
            HistorySyncMode::Incremental
        };
        if mode == HistorySyncMode::Full && !force_full {
            info!("no full history sync recorded yet, running full sync");
        }

        let report = self.history.run(mode).await?;
        if mode == HistorySyncMode::Full {
            self.state.mark_full_history_sync()?;
        }
        self.state.record_success(SyncKind::History)?;
        Ok(report)
    }

    async fn favorites_under(&self) -> SyncResult<FavoritesSyncReport> {
        let report = self.favorites.run().await?;
        self.state.record_success(SyncKind::Favorites)?;
        Ok(report)
    }
}

/// Releases `lease`, keeping the run's error ahead of a release error.
fn finish<T>(lease: SyncLease<'_>, result: SyncResult<T>) -> SyncResult<T> {
    let kind = lease.kind();
    match (result, lease.finish()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release),
        (Err(run), Ok(())) => Err(run),
        (Err(run), Err(release)) => {
            error!(%kind, error = %release, "failed to release sync lock after failed run");
            Err(run)
        }
    }
}
