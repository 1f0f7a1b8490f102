//! Store fixtures.
//!
//! Provides stores for tests, either in memory or in a temporary
//! directory that is removed when the fixture drops.

use bilisync_core::{Config, LocalStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    store: Arc<LocalStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(LocalStore::open_in_memory().expect("Failed to open in-memory store")),
            dir: None,
        }
    }

    /// Creates a new store in a temporary directory.
    pub fn on_disk() -> Self {
        Self::on_disk_with(Config::default())
    }

    /// Creates a new store in a temporary directory with `config`.
    pub fn on_disk_with(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(&dir.path().join("store"), config)
            .expect("Failed to open store");
        Self {
            store: Arc::new(store),
            dir: Some(dir),
        }
    }

    /// Returns the store directory if on disk, None if in memory.
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.dir.as_ref().map(|d| d.path().join("store"))
    }

    /// A shared handle, as sync engines take it.
    pub fn shared(&self) -> Arc<LocalStore> {
        self.store.clone()
    }

    /// Closes the store and opens it again from disk.
    ///
    /// Every handle from [`TestStore::shared`] must be dropped first, or the
    /// directory lock is still held.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        let dir = dir.expect("Only on-disk stores can be reopened");
        let config = store.config().clone();
        drop(store);
        let store = LocalStore::open(&dir.path().join("store"), config)
            .expect("Failed to reopen store");
        Self {
            store: Arc::new(store),
            dir: Some(dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore) -> R,
{
    let store = TestStore::memory();
    f(&store)
}

/// Runs a test with a store in a temporary directory.
pub fn with_disk_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore, &Path) -> R,
{
    let store = TestStore::on_disk();
    let path = store.path().expect("On-disk store should have a path");
    f(&store, &path)
}
