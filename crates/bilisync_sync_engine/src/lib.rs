//! # bilisync sync engine
//!
//! Keeps the local store in step with the remote account.
//!
//! This crate provides:
//! - History sync (full and incremental) and favorites sync with
//!   per-folder reconciliation
//! - A state machine owning the single-flight locks, tick countdowns and
//!   the full-sync gate, persisted in a settings store
//! - A coordinator for manual and scheduled runs, and a timer scheduler
//! - [`SyncService`]: the operations user-facing surfaces call
//! - Cloud backup transports
//!
//! ## Run lifecycle
//!
//! 1. A trigger (manual call or expired countdown) asks for a lease
//! 2. If a run of the same kind holds the lock the trigger is refused
//! 3. The engine fetches and writes pages strictly in sequence
//! 4. The lease is finished whatever the outcome: lock cleared, countdown
//!    reset
//!
//! The first history run is always full, whatever was requested.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cloud;
mod config;
mod coordinator;
mod error;
mod favorites;
mod history;
mod scheduler;
mod service;
mod settings;
mod state;

pub use cloud::{
    BackupTransport, MemoryTransport, WebDavAuth, WebDavConfig, WebDavTransport, BACKUP_FILENAME,
};
pub use config::SyncConfig;
pub use coordinator::{RunReport, SyncCoordinator, TickOutcome};
pub use error::{SyncError, SyncResult};
pub use favorites::{FavoritesSyncEngine, FavoritesSyncReport};
pub use history::{HistorySyncEngine, HistorySyncMode, HistorySyncReport};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::{SyncOutcome, SyncService};
pub use settings::{keys, JsonFileSettings, MemorySettings, Settings, SettingsStore};
pub use state::{KindSnapshot, SyncKind, SyncLease, SyncSnapshot, SyncStateMachine, TickDecision};
