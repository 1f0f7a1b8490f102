//! Sync state machine.
//!
//! [`SyncStateMachine`] owns every sync key in the settings store: the
//! per-kind single-flight locks, the tick countdowns, the intervals and the
//! full-sync gate. All lock transitions happen under one mutex so a
//! check-and-set cannot interleave with another.
//!
//! A run holds a [`SyncLease`]. Finishing the lease releases the lock and
//! resets the countdown; dropping an unfinished lease does the same and
//! logs any failure.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::settings::{keys, Settings};
use bilisync_core::now_millis;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, warn};

/// The two independent kinds of sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Viewing history.
    History,
    /// Favorite folders and their resources.
    Favorites,
}

impl SyncKind {
    /// Both kinds.
    pub const ALL: [SyncKind; 2] = [SyncKind::History, SyncKind::Favorites];

    /// Returns the kind's name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::History => "history",
            SyncKind::Favorites => "favorites",
        }
    }

    fn lock_key(self) -> &'static str {
        match self {
            SyncKind::History => keys::HISTORY_SYNC_IN_PROGRESS,
            SyncKind::Favorites => keys::FAVORITES_SYNC_IN_PROGRESS,
        }
    }

    fn countdown_key(self) -> &'static str {
        match self {
            SyncKind::History => keys::HISTORY_TICKS_UNTIL_NEXT_SYNC,
            SyncKind::Favorites => keys::FAVORITES_TICKS_UNTIL_NEXT_SYNC,
        }
    }

    fn interval_key(self) -> &'static str {
        match self {
            SyncKind::History => keys::HISTORY_SYNC_INTERVAL,
            SyncKind::Favorites => keys::FAVORITES_SYNC_INTERVAL,
        }
    }

    fn last_sync_key(self) -> &'static str {
        match self {
            SyncKind::History => keys::LAST_HISTORY_SYNC,
            SyncKind::Favorites => keys::LAST_FAVORITES_SYNC,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a scheduler tick should do.
pub enum TickDecision<'a> {
    /// The countdown has not run out.
    Wait {
        /// Ticks left.
        remaining: i64,
    },
    /// The countdown ran out and the lock was taken; run now.
    Run(SyncLease<'a>),
    /// The countdown ran out but a run is in progress. The countdown was
    /// reset.
    Busy,
}

impl fmt::Debug for TickDecision<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickDecision::Wait { remaining } => write!(f, "Wait {{ remaining: {remaining} }}"),
            TickDecision::Run(lease) => write!(f, "Run({})", lease.kind),
            TickDecision::Busy => f.write_str("Busy"),
        }
    }
}

/// Proof that a run of one kind holds its lock.
#[must_use = "dropping a lease releases the lock immediately"]
pub struct SyncLease<'a> {
    machine: &'a SyncStateMachine,
    kind: SyncKind,
    finished: bool,
}

impl SyncLease<'_> {
    /// The kind of run this lease covers.
    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    /// Releases the lock and resets the countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails; the lock may then
    /// still be set and is cleared by [`SyncStateMachine::recover_stale_locks`].
    pub fn finish(mut self) -> SyncResult<()> {
        self.finished = true;
        self.machine.finish_run(self.kind)
    }
}

impl Drop for SyncLease<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.machine.finish_run(self.kind) {
            error!(kind = %self.kind, error = %e, "failed to release sync lock");
        }
    }
}

/// Per-kind view of the sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSnapshot {
    /// A run holds the lock.
    pub in_progress: bool,
    /// Ticks until the next scheduled run.
    pub ticks_until_next_sync: i64,
    /// Ticks between scheduled runs.
    pub interval: u32,
    /// Unix milliseconds of the last successful run.
    pub last_sync: Option<i64>,
}

/// The whole sync state, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    /// History state.
    pub history: KindSnapshot,
    /// Favorites state.
    pub favorites: KindSnapshot,
    /// A full history run has completed at least once.
    pub has_completed_full_history_sync: bool,
}

/// The single owner of sync flags, countdowns and the full-sync gate.
pub struct SyncStateMachine {
    settings: Settings,
    history_interval: u32,
    favorites_interval: u32,
    transitions: Mutex<()>,
}

impl SyncStateMachine {
    /// Creates a state machine over `settings`, using the config's
    /// intervals for kinds without a stored interval.
    pub fn new(settings: Settings, config: &SyncConfig) -> Self {
        Self {
            settings,
            history_interval: config.history_interval,
            favorites_interval: config.favorites_interval,
            transitions: Mutex::new(()),
        }
    }

    /// The settings this machine writes to.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Takes the lock for `kind`, or returns `None` if a run holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn try_acquire(&self, kind: SyncKind) -> SyncResult<Option<SyncLease<'_>>> {
        let _transition = self.transitions.lock();
        self.acquire_locked(kind)
    }

    /// Clears the lock for `kind` without resetting the countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn release(&self, kind: SyncKind) -> SyncResult<()> {
        let _transition = self.transitions.lock();
        self.settings.set(kind.lock_key(), &false)
    }

    /// Returns true if a run of `kind` holds the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn is_in_progress(&self, kind: SyncKind) -> SyncResult<bool> {
        self.settings.get_or(kind.lock_key(), false)
    }

    /// Advances the countdown for `kind` by one tick.
    ///
    /// When the countdown reaches zero the lock is taken and a lease
    /// returned. If a run already holds the lock the countdown is reset and
    /// the lock left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn tick(&self, kind: SyncKind) -> SyncResult<TickDecision<'_>> {
        let _transition = self.transitions.lock();
        let current = self.countdown(kind)?;
        let remaining = current - 1;
        if remaining > 0 {
            self.settings.set(kind.countdown_key(), &remaining)?;
            return Ok(TickDecision::Wait { remaining });
        }

        match self.acquire_locked(kind)? {
            Some(lease) => Ok(TickDecision::Run(lease)),
            None => {
                debug!(%kind, "scheduled sync skipped, run in progress");
                self.reset_countdown_locked(kind)?;
                Ok(TickDecision::Busy)
            }
        }
    }

    /// Ticks left until the next scheduled run of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn countdown(&self, kind: SyncKind) -> SyncResult<i64> {
        let interval = self.interval(kind)?;
        self.settings
            .get_or(kind.countdown_key(), i64::from(interval))
    }

    /// Sets the countdown for `kind` back to its interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn reset_countdown(&self, kind: SyncKind) -> SyncResult<()> {
        let _transition = self.transitions.lock();
        self.reset_countdown_locked(kind)
    }

    /// Ticks between scheduled runs of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn interval(&self, kind: SyncKind) -> SyncResult<u32> {
        let default = match kind {
            SyncKind::History => self.history_interval,
            SyncKind::Favorites => self.favorites_interval,
        };
        Ok(self.settings.get_or(kind.interval_key(), default)?.max(1))
    }

    /// Changes the interval for `kind` and restarts its countdown.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero interval or if the settings store fails.
    pub fn set_interval(&self, kind: SyncKind, ticks: u32) -> SyncResult<()> {
        if ticks == 0 {
            return Err(SyncError::settings("sync interval must be at least one tick"));
        }
        let _transition = self.transitions.lock();
        self.settings.set(kind.interval_key(), &ticks)?;
        self.reset_countdown_locked(kind)
    }

    /// Whether a full history run has completed at least once.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn has_completed_full_history_sync(&self) -> SyncResult<bool> {
        self.settings
            .get_or(keys::HAS_COMPLETED_FULL_HISTORY_SYNC, false)
    }

    /// Records that a full history run completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn mark_full_history_sync(&self) -> SyncResult<()> {
        self.settings
            .set(keys::HAS_COMPLETED_FULL_HISTORY_SYNC, &true)
    }

    /// Records the time of a successful run.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn record_success(&self, kind: SyncKind) -> SyncResult<()> {
        self.settings.set(kind.last_sync_key(), &now_millis())
    }

    /// Clears locks left set by a process that died mid-run.
    ///
    /// Call once at startup, before any run can begin.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn recover_stale_locks(&self) -> SyncResult<Vec<SyncKind>> {
        let _transition = self.transitions.lock();
        let mut recovered = Vec::new();
        for kind in SyncKind::ALL {
            if self.settings.get_or(kind.lock_key(), false)? {
                warn!(%kind, "clearing stale sync lock");
                self.settings.set(kind.lock_key(), &false)?;
                self.reset_countdown_locked(kind)?;
                recovered.push(kind);
            }
        }
        Ok(recovered)
    }

    /// Reads the whole sync state.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store fails.
    pub fn snapshot(&self) -> SyncResult<SyncSnapshot> {
        Ok(SyncSnapshot {
            history: self.kind_snapshot(SyncKind::History)?,
            favorites: self.kind_snapshot(SyncKind::Favorites)?,
            has_completed_full_history_sync: self.has_completed_full_history_sync()?,
        })
    }

    fn kind_snapshot(&self, kind: SyncKind) -> SyncResult<KindSnapshot> {
        Ok(KindSnapshot {
            in_progress: self.is_in_progress(kind)?,
            ticks_until_next_sync: self.countdown(kind)?,
            interval: self.interval(kind)?,
            last_sync: self.settings.get(kind.last_sync_key())?,
        })
    }

    fn acquire_locked(&self, kind: SyncKind) -> SyncResult<Option<SyncLease<'_>>> {
        if self.settings.get_or(kind.lock_key(), false)? {
            return Ok(None);
        }
        self.settings.set(kind.lock_key(), &true)?;
        debug!(%kind, "sync lock acquired");
        Ok(Some(SyncLease {
            machine: self,
            kind,
            finished: false,
        }))
    }

    fn reset_countdown_locked(&self, kind: SyncKind) -> SyncResult<()> {
        let interval = self.interval(kind)?;
        self.settings
            .set(kind.countdown_key(), &i64::from(interval))
    }

    fn finish_run(&self, kind: SyncKind) -> SyncResult<()> {
        let _transition = self.transitions.lock();
        let released = self.settings.set(kind.lock_key(), &false);
        let reset = self.reset_countdown_locked(kind);
        debug!(%kind, "sync lock released");
        released.and(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SyncStateMachine {
        SyncStateMachine::new(
            Settings::in_memory(),
            &SyncConfig::new().with_intervals(1, 3),
        )
    }

    #[test]
    fn single_flight_per_kind() {
        let machine = machine();
        let lease = machine.try_acquire(SyncKind::History).unwrap().unwrap();
        assert!(machine.try_acquire(SyncKind::History).unwrap().is_none());
        assert!(machine.is_in_progress(SyncKind::History).unwrap());

        let other = machine.try_acquire(SyncKind::Favorites).unwrap();
        assert!(other.is_some());

        lease.finish().unwrap();
        assert!(!machine.is_in_progress(SyncKind::History).unwrap());
        assert!(machine.try_acquire(SyncKind::History).unwrap().is_some());
    }

    #[test]
    fn dropped_lease_releases() {
        let machine = machine();
        {
            let _lease = machine.try_acquire(SyncKind::Favorites).unwrap().unwrap();
        }
        assert!(!machine.is_in_progress(SyncKind::Favorites).unwrap());
    }

    #[test]
    fn countdown_runs_on_the_last_tick() {
        let machine = machine();
        assert_eq!(machine.countdown(SyncKind::Favorites).unwrap(), 3);

        assert!(matches!(
            machine.tick(SyncKind::Favorites).unwrap(),
            TickDecision::Wait { remaining: 2 }
        ));
        assert!(matches!(
            machine.tick(SyncKind::Favorites).unwrap(),
            TickDecision::Wait { remaining: 1 }
        ));
        let TickDecision::Run(lease) = machine.tick(SyncKind::Favorites).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(lease.kind(), SyncKind::Favorites);
        lease.finish().unwrap();
        assert_eq!(machine.countdown(SyncKind::Favorites).unwrap(), 3);
    }

    #[test]
    fn busy_tick_keeps_lock_and_resets_countdown() {
        let machine = machine();
        let lease = machine.try_acquire(SyncKind::History).unwrap().unwrap();

        assert!(matches!(
            machine.tick(SyncKind::History).unwrap(),
            TickDecision::Busy
        ));
        assert!(machine.is_in_progress(SyncKind::History).unwrap());
        assert_eq!(machine.countdown(SyncKind::History).unwrap(), 1);
        lease.finish().unwrap();
    }

    #[test]
    fn interval_changes_restart_countdown() {
        let machine = machine();
        machine.set_interval(SyncKind::History, 10).unwrap();
        assert_eq!(machine.countdown(SyncKind::History).unwrap(), 10);
        assert!(machine.set_interval(SyncKind::History, 0).is_err());
    }

    #[test]
    fn recovers_stale_locks() {
        let settings = Settings::in_memory();
        settings.set(keys::HISTORY_SYNC_IN_PROGRESS, &true).unwrap();
        let machine = SyncStateMachine::new(settings, &SyncConfig::new());

        assert_eq!(machine.recover_stale_locks().unwrap(), vec![SyncKind::History]);
        assert!(machine.try_acquire(SyncKind::History).unwrap().is_some());
        assert!(machine.recover_stale_locks().unwrap().is_empty());
    }

    #[test]
    fn full_sync_gate_and_snapshot() {
        let machine = machine();
        assert!(!machine.has_completed_full_history_sync().unwrap());
        machine.mark_full_history_sync().unwrap();
        machine.record_success(SyncKind::History).unwrap();

        let snapshot = machine.snapshot().unwrap();
        assert!(snapshot.has_completed_full_history_sync);
        assert!(snapshot.history.last_sync.is_some());
        assert_eq!(snapshot.favorites.last_sync, None);
        assert_eq!(snapshot.favorites.interval, 3);
    }
}
