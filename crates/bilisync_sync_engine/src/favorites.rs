//! Favorites sync engine.
//!
//! A run resolves the account, re-fetches the full folder list and then
//! syncs each folder on its own:
//!
//! 1. Page through the folder's resources until the remote reports no
//!    more, linking each resource to the folder and its position.
//! 2. Keep the last good display fields of resources the remote now shows
//!    as invalidated.
//!
//! Once every folder is fetched, local resources of each fetched folder
//! that no folder returned are deleted. Deleting only after all fetches
//! lets a resource that moved between folders keep its stored display
//! fields whatever the folder order.
//!
//! A folder whose pages fail is logged and skipped, reconciliation
//! included; the other folders still sync.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use bilisync_core::{FavoriteFolder, FavoriteResource, LocalStore};
use bilisync_remote::FavoritesApi;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a favorites run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesSyncReport {
    /// Account whose folders were synced.
    pub mid: u64,
    /// Folders fetched.
    pub folders: usize,
    /// Resources written across all folders.
    pub resources_written: usize,
    /// Stale resources deleted across all folders.
    pub resources_removed: usize,
    /// Folders whose resource pages failed.
    pub failed_folders: Vec<u64>,
}

#[derive(Debug, Default)]
struct FolderOutcome {
    written: usize,
    /// Ids the folder listed; `None` when its pages failed.
    seen: Option<HashSet<u64>>,
}

/// Drives favorites runs against one store and remote.
pub struct FavoritesSyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn FavoritesApi>,
    config: SyncConfig,
}

impl FavoritesSyncEngine {
    /// Creates an engine.
    pub fn new(store: Arc<LocalStore>, remote: Arc<dyn FavoritesApi>, config: SyncConfig) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    /// Runs one favorites sync.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is available, if the identity or
    /// folder list cannot be fetched, or if a local write fails. Failures
    /// fetching one folder's resources are reported in
    /// [`FavoritesSyncReport::failed_folders`] instead.
    pub async fn run(&self) -> SyncResult<FavoritesSyncReport> {
        if !self.remote.has_session() {
            return Err(SyncError::NotLoggedIn);
        }

        let mid = self.remote.current_mid().await?;
        let folders: Vec<FavoriteFolder> = self
            .remote
            .list_folders(mid)
            .await?
            .into_iter()
            .enumerate()
            .map(|(position, mut folder)| {
                folder.index = position as u32;
                folder
            })
            .collect();
        if !folders.is_empty() {
            self.store.put_folders(&folders)?;
        }
        info!(mid, folders = folders.len(), "favorite folders stored");

        let mut report = FavoritesSyncReport {
            mid,
            folders: folders.len(),
            ..Default::default()
        };
        let mut fetched = Vec::with_capacity(folders.len());
        let mut seen_anywhere = HashSet::new();
        for folder in &folders {
            let outcome = self.sync_folder(folder).await?;
            report.resources_written += outcome.written;
            match outcome.seen {
                Some(seen) => {
                    seen_anywhere.extend(seen);
                    fetched.push(folder.id);
                }
                None => report.failed_folders.push(folder.id),
            }
        }

        for folder_id in fetched {
            match self.remove_stale(folder_id, &seen_anywhere) {
                Ok(removed) => report.resources_removed += removed,
                Err(e) => error!(
                    folder_id,
                    error = %e,
                    "failed to remove unfavorited resources"
                ),
            }
        }

        info!(
            mid,
            folders = report.folders,
            written = report.resources_written,
            removed = report.resources_removed,
            failed = report.failed_folders.len(),
            "favorites sync finished"
        );
        Ok(report)
    }

    async fn sync_folder(&self, folder: &FavoriteFolder) -> SyncResult<FolderOutcome> {
        let page_size = self.config.favorites_page_size;
        let mut outcome = FolderOutcome::default();
        let mut seen = HashSet::new();
        let mut page = 1u32;

        loop {
            let listing = match self.remote.list_resources(folder.id, page, page_size).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(
                        folder_id = folder.id,
                        title = %folder.title,
                        page,
                        error = %e,
                        "failed to fetch folder resources, skipping folder"
                    );
                    return Ok(outcome);
                }
            };
            if listing.medias.is_empty() {
                break;
            }

            let offset = (page - 1) * page_size;
            let resources: Vec<FavoriteResource> = listing
                .medias
                .into_iter()
                .enumerate()
                .map(|(position, mut resource)| {
                    resource.folder_id = folder.id;
                    resource.index = offset + position as u32;
                    let prior = self.store.get_resource(resource.id);
                    resource.preserving_display_of(prior.as_ref())
                })
                .collect();
            seen.extend(resources.iter().map(|r| r.id));
            outcome.written += self.store.put_resources(&resources)?;
            debug!(folder_id = folder.id, page, count = resources.len(), "folder page stored");

            if !listing.has_more {
                break;
            }
            page += 1;
            if !self.config.favorites_page_delay.is_zero() {
                tokio::time::sleep(self.config.favorites_page_delay).await;
            }
        }

        outcome.seen = Some(seen);
        Ok(outcome)
    }

    fn remove_stale(&self, folder_id: u64, seen: &HashSet<u64>) -> SyncResult<usize> {
        let stale: Vec<u64> = self
            .store
            .resources_in_folder(folder_id)
            .into_iter()
            .map(|r| r.id)
            .filter(|id| !seen.contains(id))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        let removed = self.store.delete_resources(&stale)?;
        info!(folder_id, removed, "removed unfavorited resources");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bilisync_core::INVALIDATED_TITLE;
    use bilisync_remote::{MockRemote, RemoteCall, RemoteError};

    fn folder(id: u64) -> FavoriteFolder {
        FavoriteFolder {
            id,
            mid: 42,
            title: format!("folder {id}"),
            ..Default::default()
        }
    }

    fn resource(id: u64) -> FavoriteResource {
        FavoriteResource {
            id,
            title: format!("video {id}"),
            bvid: format!("BV{id}"),
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MockRemote>, Arc<LocalStore>, FavoritesSyncEngine) {
        let remote = Arc::new(MockRemote::new());
        remote.set_mid(42);
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let engine = FavoritesSyncEngine::new(
            store.clone(),
            remote.clone(),
            SyncConfig::new().without_delays().with_favorites_page_size(2),
        );
        (remote, store, engine)
    }

    #[tokio::test]
    async fn assigns_folder_and_page_positions() {
        let (remote, store, engine) = setup();
        remote.set_folders(vec![folder(10), folder(20)]);
        remote.set_resources(10, (1..=5).map(resource).collect());

        let report = engine.run().await.unwrap();
        assert_eq!(report.folders, 2);
        assert_eq!(report.resources_written, 5);

        let folders = store.folders(Some(42));
        assert_eq!(folders.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1]);

        let stored = store.resources_in_folder(10);
        let mut positions: Vec<(u64, u32)> = stored.iter().map(|r| (r.id, r.index)).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![(1, 0), (2, 1), (3, 2), (4, 3), (5, 4)]);
        assert!(remote.calls().contains(&RemoteCall::ListResources {
            media_id: 10,
            page: 3,
            page_size: 2
        }));
    }

    #[tokio::test]
    async fn removes_unfavorited_resources() {
        let (remote, store, engine) = setup();
        remote.set_folders(vec![folder(10)]);
        store
            .put_resources(
                &(1..=3)
                    .map(|id| FavoriteResource {
                        folder_id: 10,
                        ..resource(id)
                    })
                    .collect::<Vec<_>>(),
            )
            .unwrap();
        remote.set_resources(10, vec![resource(2), resource(3)]);

        let report = engine.run().await.unwrap();
        assert_eq!(report.resources_removed, 1);
        let mut ids: Vec<u64> = store.resources_in_folder(10).iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn keeps_display_fields_of_invalidated_resources() {
        let (remote, store, engine) = setup();
        remote.set_folders(vec![folder(10), folder(20)]);
        store
            .put_resources(&[FavoriteResource {
                folder_id: 10,
                index: 9,
                title: "Real Title".into(),
                cover: "real.jpg".into(),
                ..resource(7)
            }])
            .unwrap();
        remote.set_resources(
            20,
            vec![FavoriteResource {
                title: INVALIDATED_TITLE.into(),
                cover: String::new(),
                ..resource(7)
            }],
        );

        engine.run().await.unwrap();
        let stored = store.get_resource(7).unwrap();
        assert_eq!(stored.title, "Real Title");
        assert_eq!(stored.cover, "real.jpg");
        assert_eq!(stored.folder_id, 20);
        assert_eq!(stored.index, 0);
    }

    #[tokio::test]
    async fn moved_resource_survives_reconciliation_in_either_folder_order() {
        for order in [[10, 20], [20, 10]] {
            let (remote, store, engine) = setup();
            remote.set_folders(order.iter().copied().map(folder).collect());
            store
                .put_resources(&[
                    FavoriteResource {
                        folder_id: 10,
                        title: "Real Title".into(),
                        intro: "kept".into(),
                        ..resource(7)
                    },
                    FavoriteResource {
                        folder_id: 10,
                        ..resource(8)
                    },
                ])
                .unwrap();
            remote.set_resources(
                20,
                vec![FavoriteResource {
                    title: INVALIDATED_TITLE.into(),
                    ..resource(7)
                }],
            );

            let report = engine.run().await.unwrap();
            assert_eq!(report.resources_removed, 1, "order {order:?}");
            assert!(store.get_resource(8).is_none());

            let stored = store.get_resource(7).unwrap();
            assert_eq!(stored.title, "Real Title", "order {order:?}");
            assert_eq!(stored.intro, "kept");
            assert_eq!(stored.folder_id, 20);
        }
    }

    #[tokio::test]
    async fn failing_folder_is_isolated() {
        let (remote, store, engine) = setup();
        remote.set_folders(vec![folder(10), folder(20)]);
        store
            .put_resources(&[FavoriteResource {
                folder_id: 10,
                ..resource(1)
            }])
            .unwrap();
        remote.fail_folder(10);
        remote.set_resources(20, vec![resource(5)]);

        let report = engine.run().await.unwrap();
        assert_eq!(report.failed_folders, vec![10]);
        assert_eq!(report.resources_written, 1);
        // The failed folder is not reconciled against an incomplete listing.
        assert!(store.get_resource(1).is_some());
        assert!(store.get_resource(5).is_some());
    }

    #[tokio::test]
    async fn identity_and_folder_failures_are_fatal() {
        let (remote, _store, engine) = setup();
        remote.fail_identity(RemoteError::Http { status: 500 });
        assert!(matches!(
            engine.run().await,
            Err(SyncError::Remote(RemoteError::Http { status: 500 }))
        ));

        let (remote, _store, engine) = setup();
        remote.fail_folder_list(RemoteError::api(-400, "bad request"));
        assert!(engine.run().await.is_err());
        assert!(!remote
            .calls()
            .iter()
            .any(|c| matches!(c, RemoteCall::ListResources { .. })));
    }

    #[tokio::test]
    async fn missing_session_makes_no_requests() {
        let (remote, _store, engine) = setup();
        remote.set_logged_in(false);
        assert!(matches!(engine.run().await, Err(SyncError::NotLoggedIn)));
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_folder_clears_local_resources() {
        let (remote, store, engine) = setup();
        remote.set_folders(vec![folder(10)]);
        store
            .put_resources(&[FavoriteResource {
                folder_id: 10,
                ..resource(1)
            }])
            .unwrap();

        engine.run().await.unwrap();
        assert_eq!(store.resource_count(Some(10)), 0);
    }
}
