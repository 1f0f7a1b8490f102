//! Timer-driven sync scheduling.
//!
//! Every tick period the scheduler spawns one tick per sync kind. A tick
//! that finds its countdown expired runs the sync inside the spawned task,
//! so a long favorites run never delays history ticks. Same-kind overlap
//! is prevented by the coordinator's locks.

use crate::coordinator::{SyncCoordinator, TickOutcome};
use crate::state::SyncKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Periodically ticks the coordinator.
pub struct Scheduler {
    coordinator: Arc<SyncCoordinator>,
    period: Duration,
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the scheduler and waits for its loop to exit.
    ///
    /// Runs already started keep going in their own tasks.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler task failed");
        }
    }
}

impl Scheduler {
    /// Creates a scheduler ticking every `period`.
    pub fn new(coordinator: Arc<SyncCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    /// Starts the scheduler on the current runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        SchedulerHandle { shutdown, task }
    }

    /// Ticks until `shutdown` turns true or its sender is dropped.
    ///
    /// The first tick fires one period after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let start = tokio::time::Instant::now() + self.period;
        let mut interval = tokio::time::interval_at(start, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = self.period.as_millis() as u64, "scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for kind in SyncKind::ALL {
                        let coordinator = self.coordinator.clone();
                        tokio::spawn(async move { tick_once(&coordinator, kind).await });
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

async fn tick_once(coordinator: &SyncCoordinator, kind: SyncKind) {
    match coordinator.tick(kind).await {
        Ok(TickOutcome::Waiting { remaining }) => debug!(%kind, remaining, "sync not due"),
        Ok(TickOutcome::Skipped) => debug!(%kind, "sync due but already running"),
        Ok(TickOutcome::Ran(Ok(report))) => debug!(%kind, ?report, "scheduled sync done"),
        Ok(TickOutcome::Ran(Err(_))) => {}
        Err(e) => error!(%kind, error = %e, "scheduler tick failed"),
    }
}
