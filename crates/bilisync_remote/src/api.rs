//! Client traits the sync engines are written against.

use crate::error::RemoteResult;
use async_trait::async_trait;
use bilisync_core::{Business, FavoriteFolder, FavoriteResource, HistoryRecord};

/// Position in the remote history listing.
///
/// Both fields start at zero; each page returns the cursor for the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    /// Id of the last item returned.
    pub max: u64,
    /// View time of the last item returned.
    pub view_at: i64,
}

impl HistoryCursor {
    /// The cursor for the newest page.
    pub const START: Self = Self { max: 0, view_at: 0 };
}

/// One page of the history listing, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Records with `synced_at` unset.
    pub items: Vec<HistoryRecord>,
    /// Cursor for the following page.
    pub cursor: HistoryCursor,
}

/// One page of a folder's resources.
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    /// Resources in remote order, not yet linked to a folder.
    pub medias: Vec<FavoriteResource>,
    /// Whether the remote reports further pages.
    pub has_more: bool,
}

/// Exposes whether a session is available without making a request.
pub trait RemoteSession: Send + Sync {
    /// Returns true if a session credential is present.
    fn has_session(&self) -> bool;
}

/// The history endpoints.
#[async_trait]
pub trait HistoryApi: RemoteSession {
    /// Fetches up to `page_size` records older than `cursor`.
    async fn fetch_history_page(
        &self,
        cursor: HistoryCursor,
        page_size: u32,
    ) -> RemoteResult<HistoryPage>;

    /// Deletes one item from the remote history.
    async fn delete_history(&self, business: &Business, id: u64) -> RemoteResult<()>;
}

/// The favorites endpoints.
#[async_trait]
pub trait FavoritesApi: RemoteSession {
    /// Returns the account id of the current session.
    async fn current_mid(&self) -> RemoteResult<u64>;

    /// Lists every folder created by `mid`, in remote display order.
    async fn list_folders(&self, mid: u64) -> RemoteResult<Vec<FavoriteFolder>>;

    /// Fetches page `page` (1-based) of a folder's resources.
    async fn list_resources(
        &self,
        media_id: u64,
        page: u32,
        page_size: u32,
    ) -> RemoteResult<ResourcePage>;
}
