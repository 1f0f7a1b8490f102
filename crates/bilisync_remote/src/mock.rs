//! A scripted remote for tests.
//!
//! [`MockRemote`] serves history and favorites from in-memory data, pages
//! them the way the real endpoints do, and records every call.

use crate::api::{FavoritesApi, HistoryApi, HistoryCursor, HistoryPage, RemoteSession, ResourcePage};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use bilisync_core::{Business, FavoriteFolder, FavoriteResource, HistoryRecord};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A request received by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `fetch_history_page`.
    HistoryPage {
        /// Cursor sent.
        cursor: HistoryCursor,
        /// Page size sent.
        page_size: u32,
    },
    /// `delete_history`.
    DeleteHistory {
        /// Category sent.
        business: Business,
        /// Id sent.
        id: u64,
    },
    /// `current_mid`.
    CurrentMid,
    /// `list_folders`.
    ListFolders {
        /// Account id sent.
        mid: u64,
    },
    /// `list_resources`.
    ListResources {
        /// Folder id sent.
        media_id: u64,
        /// Page number sent.
        page: u32,
        /// Page size sent.
        page_size: u32,
    },
}

#[derive(Default)]
struct Script {
    history: Vec<HistoryRecord>,
    history_failure: Option<(usize, RemoteError)>,
    history_requests: usize,
    mid: u64,
    identity_failure: Option<RemoteError>,
    folders: Vec<FavoriteFolder>,
    folder_failure: Option<RemoteError>,
    resources: HashMap<u64, Vec<FavoriteResource>>,
    failing_folders: HashSet<u64>,
    delete_failure: Option<RemoteError>,
    calls: Vec<RemoteCall>,
}

/// A remote backed by scripted data.
///
/// History is served newest first, following the cursor semantics of the
/// real listing. Logged in by default.
pub struct MockRemote {
    logged_in: AtomicBool,
    script: Mutex<Script>,
    history_gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Creates a logged-in remote with no data.
    pub fn new() -> Self {
        Self {
            logged_in: AtomicBool::new(true),
            script: Mutex::new(Script {
                mid: 1,
                ..Script::default()
            }),
            history_gate: Mutex::new(None),
        }
    }

    /// Sets whether a session is present.
    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Replaces the remote history. Records are served by `view_at`
    /// descending.
    pub fn set_history(&self, mut records: Vec<HistoryRecord>) {
        records.sort_by(|a, b| b.view_at.cmp(&a.view_at).then(b.id.cmp(&a.id)));
        self.script.lock().history = records;
    }

    /// Makes the `request`-th history fetch (0-based, counted from now on)
    /// fail with `error`.
    pub fn fail_history_request(&self, request: usize, error: RemoteError) {
        let mut script = self.script.lock();
        let at = script.history_requests + request;
        script.history_failure = Some((at, error));
    }

    /// Makes history fetches wait until `gate` is notified.
    pub fn hold_history(&self, gate: Arc<Notify>) {
        *self.history_gate.lock() = Some(gate);
    }

    /// Stops holding history fetches made from now on. Fetches already
    /// waiting still need their gate notified.
    pub fn release_history(&self) {
        *self.history_gate.lock() = None;
    }

    /// Sets the account id returned by `current_mid`.
    pub fn set_mid(&self, mid: u64) {
        self.script.lock().mid = mid;
    }

    /// Makes `current_mid` fail.
    pub fn fail_identity(&self, error: RemoteError) {
        self.script.lock().identity_failure = Some(error);
    }

    /// Replaces the folder list.
    pub fn set_folders(&self, folders: Vec<FavoriteFolder>) {
        self.script.lock().folders = folders;
    }

    /// Makes `list_folders` fail.
    pub fn fail_folder_list(&self, error: RemoteError) {
        self.script.lock().folder_failure = Some(error);
    }

    /// Replaces the resources of one folder, in remote order.
    pub fn set_resources(&self, folder_id: u64, resources: Vec<FavoriteResource>) {
        self.script.lock().resources.insert(folder_id, resources);
    }

    /// Makes every resource page of `folder_id` fail.
    pub fn fail_folder(&self, folder_id: u64) {
        self.script.lock().failing_folders.insert(folder_id);
    }

    /// Makes `delete_history` fail with `error`.
    pub fn fail_deletes(&self, error: RemoteError) {
        self.script.lock().delete_failure = Some(error);
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.script.lock().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    /// Number of history page requests received so far.
    pub fn history_requests(&self) -> usize {
        self.script.lock().history_requests
    }

    fn require_session(&self) -> RemoteResult<()> {
        if self.has_session() {
            Ok(())
        } else {
            Err(RemoteError::NotLoggedIn)
        }
    }
}

fn history_page_after(
    history: &[HistoryRecord],
    cursor: HistoryCursor,
    page_size: usize,
) -> HistoryPage {
    let start = if cursor == HistoryCursor::START {
        0
    } else {
        history
            .iter()
            .position(|r| r.id == cursor.max && r.view_at == cursor.view_at)
            .map(|pos| pos + 1)
            .unwrap_or_else(|| history.partition_point(|r| r.view_at >= cursor.view_at))
    };
    let items: Vec<HistoryRecord> = history.iter().skip(start).take(page_size).cloned().collect();
    let cursor = items.last().map_or(cursor, |last| HistoryCursor {
        max: last.id,
        view_at: last.view_at,
    });
    HistoryPage { items, cursor }
}

impl RemoteSession for MockRemote {
    fn has_session(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryApi for MockRemote {
    async fn fetch_history_page(
        &self,
        cursor: HistoryCursor,
        page_size: u32,
    ) -> RemoteResult<HistoryPage> {
        let gate = self.history_gate.lock().clone();
        let request = {
            let mut script = self.script.lock();
            script.calls.push(RemoteCall::HistoryPage { cursor, page_size });
            script.history_requests += 1;
            script.history_requests - 1
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.require_session()?;

        let mut script = self.script.lock();
        if let Some((at, error)) = &script.history_failure {
            if *at == request {
                let error = error.clone();
                script.history_failure = None;
                return Err(error);
            }
        }
        Ok(history_page_after(&script.history, cursor, page_size as usize))
    }

    async fn delete_history(&self, business: &Business, id: u64) -> RemoteResult<()> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::DeleteHistory {
            business: business.clone(),
            id,
        });
        if !self.has_session() {
            return Err(RemoteError::NotLoggedIn);
        }
        match &script.delete_failure {
            Some(error) => Err(error.clone()),
            None => {
                script.history.retain(|r| r.id != id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl FavoritesApi for MockRemote {
    async fn current_mid(&self) -> RemoteResult<u64> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::CurrentMid);
        if !self.has_session() {
            return Err(RemoteError::NotLoggedIn);
        }
        match &script.identity_failure {
            Some(error) => Err(error.clone()),
            None => Ok(script.mid),
        }
    }

    async fn list_folders(&self, mid: u64) -> RemoteResult<Vec<FavoriteFolder>> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::ListFolders { mid });
        if let Some(error) = &script.folder_failure {
            return Err(error.clone());
        }
        Ok(script.folders.clone())
    }

    async fn list_resources(
        &self,
        media_id: u64,
        page: u32,
        page_size: u32,
    ) -> RemoteResult<ResourcePage> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::ListResources {
            media_id,
            page,
            page_size,
        });
        if script.failing_folders.contains(&media_id) {
            return Err(RemoteError::api(-400, "folder unavailable"));
        }
        let all = script.resources.get(&media_id).map_or(&[][..], Vec::as_slice);
        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let medias: Vec<FavoriteResource> =
            all.iter().skip(start).take(page_size as usize).cloned().collect();
        Ok(ResourcePage {
            has_more: start + medias.len() < all.len(),
            medias,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, view_at: i64) -> HistoryRecord {
        HistoryRecord {
            id,
            view_at,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pages_history_by_cursor() {
        let remote = MockRemote::new();
        remote.set_history((1..=5).map(|i| record(i, 100 + i as i64)).collect());

        let first = remote.fetch_history_page(HistoryCursor::START, 2).await.unwrap();
        let ids: Vec<u64> = first.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(first.cursor, HistoryCursor { max: 4, view_at: 104 });

        let second = remote.fetch_history_page(first.cursor, 2).await.unwrap();
        assert_eq!(second.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);

        let third = remote.fetch_history_page(second.cursor, 2).await.unwrap();
        let last = remote.fetch_history_page(third.cursor, 2).await.unwrap();
        assert_eq!(third.items.len(), 1);
        assert!(last.items.is_empty());
        assert_eq!(remote.history_requests(), 4);
    }

    #[tokio::test]
    async fn scripted_history_failure() {
        let remote = MockRemote::new();
        remote.set_history(vec![record(1, 1)]);
        remote.fail_history_request(1, RemoteError::Http { status: 412 });

        assert!(remote.fetch_history_page(HistoryCursor::START, 30).await.is_ok());
        assert_eq!(
            remote.fetch_history_page(HistoryCursor::START, 30).await.unwrap_err(),
            RemoteError::Http { status: 412 }
        );
        assert!(remote.fetch_history_page(HistoryCursor::START, 30).await.is_ok());
    }

    #[tokio::test]
    async fn pages_resources() {
        let remote = MockRemote::new();
        let resources = (1..=5)
            .map(|id| FavoriteResource {
                id,
                ..Default::default()
            })
            .collect();
        remote.set_resources(9, resources);

        let page = remote.list_resources(9, 1, 2).await.unwrap();
        assert!(page.has_more);
        let page = remote.list_resources(9, 3, 2).await.unwrap();
        assert_eq!(page.medias.len(), 1);
        assert!(!page.has_more);

        let empty = remote.list_resources(10, 1, 2).await.unwrap();
        assert!(empty.medias.is_empty() && !empty.has_more);
    }

    #[tokio::test]
    async fn logged_out_calls_fail() {
        let remote = MockRemote::new();
        remote.set_logged_in(false);
        assert!(!remote.has_session());
        assert_eq!(remote.current_mid().await.unwrap_err(), RemoteError::NotLoggedIn);
        assert_eq!(remote.calls(), vec![RemoteCall::CurrentMid]);
    }
}
