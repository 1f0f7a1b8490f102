//! History sync engine.
//!
//! Walks the remote history listing newest first and upserts every page
//! into the local store. Pages are fetched and written strictly one after
//! another, with a fixed pause in between.
//!
//! In incremental mode a page whose first and last records are both
//! already stored marks the boundary: nothing from it is written and the
//! run stops.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use bilisync_core::{now_millis, HistoryRecord, LocalStore};
use bilisync_remote::{HistoryApi, HistoryCursor};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How far back a history run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySyncMode {
    /// Fetch every page the remote returns.
    Full,
    /// Stop at the first page already covered locally.
    Incremental,
}

impl fmt::Display for HistorySyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistorySyncMode::Full => f.write_str("full"),
            HistorySyncMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// What a history run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySyncReport {
    /// The mode the run used.
    pub mode: HistorySyncMode,
    /// Pages fetched, including the final empty or boundary page.
    pub pages: u32,
    /// Records written.
    pub written: usize,
    /// The run stopped at an already-synced page.
    pub reached_boundary: bool,
}

/// Drives history runs against one store and remote.
pub struct HistorySyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn HistoryApi>,
    config: SyncConfig,
}

impl HistorySyncEngine {
    /// Creates an engine.
    pub fn new(store: Arc<LocalStore>, remote: Arc<dyn HistoryApi>, config: SyncConfig) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    /// Runs one sync in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLoggedIn`] before any request when no session
    /// is available. A failed page fetch or a failed write aborts the run;
    /// pages written before it stay written.
    pub async fn run(&self, mode: HistorySyncMode) -> SyncResult<HistorySyncReport> {
        if !self.remote.has_session() {
            return Err(SyncError::NotLoggedIn);
        }

        let mut report = HistorySyncReport {
            mode,
            pages: 0,
            written: 0,
            reached_boundary: false,
        };
        let mut cursor = HistoryCursor::START;

        loop {
            if report.pages > 0 && !self.config.history_page_delay.is_zero() {
                tokio::time::sleep(self.config.history_page_delay).await;
            }

            let page = self
                .remote
                .fetch_history_page(cursor, self.config.history_page_size)
                .await?;
            report.pages += 1;

            let (Some(first), Some(last)) = (page.items.first(), page.items.last()) else {
                debug!(pages = report.pages, "history listing exhausted");
                break;
            };

            if mode == HistorySyncMode::Incremental
                && self.store.contains_history(first.id)
                && self.store.contains_history(last.id)
            {
                info!(
                    pages = report.pages,
                    first = first.id,
                    last = last.id,
                    "incremental sync reached synced records"
                );
                report.reached_boundary = true;
                break;
            }

            let written = self.write_page(page.items)?;
            report.written += written;
            debug!(page = report.pages, written, "history page stored");

            if page.cursor == cursor {
                warn!(
                    max = cursor.max,
                    view_at = cursor.view_at,
                    "history cursor did not advance, stopping"
                );
                break;
            }
            cursor = page.cursor;
        }

        info!(
            %mode,
            pages = report.pages,
            written = report.written,
            boundary = report.reached_boundary,
            "history sync finished"
        );
        Ok(report)
    }

    fn write_page(&self, mut items: Vec<HistoryRecord>) -> SyncResult<usize> {
        let synced_at = now_millis();
        for item in &mut items {
            item.synced_at = synced_at;
        }
        Ok(self.store.put_history_many(&items)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bilisync_remote::{MockRemote, RemoteCall, RemoteError};

    fn record(id: u64) -> HistoryRecord {
        HistoryRecord {
            id,
            bvid: format!("BV{id}"),
            title: format!("video {id}"),
            view_at: 1_700_000_000 + id as i64,
            ..Default::default()
        }
    }

    fn engine(remote: &Arc<MockRemote>, store: &Arc<LocalStore>, page_size: u32) -> HistorySyncEngine {
        HistorySyncEngine::new(
            store.clone(),
            remote.clone(),
            SyncConfig::new()
                .without_delays()
                .with_history_page_size(page_size),
        )
    }

    #[tokio::test]
    async fn full_sync_writes_every_page() {
        let remote = Arc::new(MockRemote::new());
        remote.set_history((1..=7).map(record).collect());
        let store = Arc::new(LocalStore::open_in_memory().unwrap());

        let report = engine(&remote, &store, 3).run(HistorySyncMode::Full).await.unwrap();
        assert_eq!(report.written, 7);
        assert_eq!(report.pages, 4);
        assert!(!report.reached_boundary);
        assert_eq!(store.history_count(), 7);
        assert!(store.all_history().iter().all(|r| r.synced_at > 0));
    }

    #[tokio::test]
    async fn incremental_stops_at_covered_page_without_writing_it() {
        let remote = Arc::new(MockRemote::new());
        remote.set_history((1..=9).map(record).collect());
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        store
            .put_history_many(&(1..=6).map(record).collect::<Vec<_>>())
            .unwrap();

        let report = engine(&remote, &store, 3)
            .run(HistorySyncMode::Incremental)
            .await
            .unwrap();

        assert!(report.reached_boundary);
        assert_eq!(report.pages, 2);
        assert_eq!(report.written, 3);
        assert_eq!(store.history_count(), 9);
        // The boundary page kept its earlier write stamp.
        assert_eq!(store.get_history(6).unwrap().synced_at, 0);
    }

    #[tokio::test]
    async fn incremental_writes_partially_covered_page() {
        let remote = Arc::new(MockRemote::new());
        remote.set_history((1..=4).map(record).collect());
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        store.put_history(&record(3)).unwrap();

        let report = engine(&remote, &store, 2)
            .run(HistorySyncMode::Incremental)
            .await
            .unwrap();
        // Page [4, 3] has only one endpoint stored, so it is written; page
        // [2, 1] has none.
        assert!(!report.reached_boundary);
        assert_eq!(report.written, 4);
    }

    #[tokio::test]
    async fn missing_session_fails_before_any_request() {
        let remote = Arc::new(MockRemote::new());
        remote.set_logged_in(false);
        let store = Arc::new(LocalStore::open_in_memory().unwrap());

        let err = engine(&remote, &store, 30)
            .run(HistorySyncMode::Full)
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn page_failure_aborts_and_keeps_earlier_pages() {
        let remote = Arc::new(MockRemote::new());
        remote.set_history((1..=6).map(record).collect());
        remote.fail_history_request(1, RemoteError::api(-412, "blocked"));
        let store = Arc::new(LocalStore::open_in_memory().unwrap());

        let err = engine(&remote, &store, 2)
            .run(HistorySyncMode::Full)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Api { code: -412, .. })));
        assert_eq!(store.history_count(), 2);
        assert_eq!(remote.history_requests(), 2);
    }

    #[tokio::test]
    async fn requests_follow_returned_cursor() {
        let remote = Arc::new(MockRemote::new());
        remote.set_history((1..=3).map(record).collect());
        let store = Arc::new(LocalStore::open_in_memory().unwrap());

        engine(&remote, &store, 2).run(HistorySyncMode::Full).await.unwrap();

        let cursors: Vec<HistoryCursor> = remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::HistoryPage { cursor, page_size } => {
                    assert_eq!(page_size, 2);
                    Some(cursor)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            cursors,
            vec![
                HistoryCursor::START,
                HistoryCursor {
                    max: 2,
                    view_at: 1_700_000_002
                },
                HistoryCursor {
                    max: 1,
                    view_at: 1_700_000_001
                },
            ]
        );
    }
}
