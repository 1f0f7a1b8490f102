//! HTTP implementation of the remote clients.

use crate::api::{FavoritesApi, HistoryApi, HistoryCursor, HistoryPage, RemoteSession, ResourcePage};
use crate::credentials::{CredentialProvider, SessionCredential};
use crate::error::{RemoteError, RemoteResult};
use crate::messages::{
    ApiEnvelope, FolderListData, HistoryCursorData, NavData, ResourceListData,
};
use async_trait::async_trait;
use bilisync_core::{Business, FavoriteFolder, HistoryRecord};
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.bilibili.com";

const DEFAULT_USER_AGENT: &str = concat!("bilisync/", env!("CARGO_PKG_VERSION"));
const REFERER_URL: &str = "https://www.bilibili.com";

/// Configuration for [`BiliClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API host, without trailing slash.
    pub base_url: String,
    /// Total time allowed per request.
    pub timeout: Duration,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Client for the history and favorites endpoints.
///
/// Reads the session from its [`CredentialProvider`] on every request.
#[derive(Clone)]
pub struct BiliClient {
    http: Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl BiliClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn session(&self) -> RemoteResult<SessionCredential> {
        self.credentials.session().ok_or(RemoteError::NotLoggedIn)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let session = self.session()?;
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .header(COOKIE, session.cookie_header())
            .header(USER_AGENT, &self.config.user_agent)
            .header(REFERER, REFERER_URL)
            .send()
            .await?;
        read_envelope::<T>(response).await?.into_data()
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> RemoteResult<ApiEnvelope<T>> {
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Http {
            status: status.as_u16(),
        });
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl RemoteSession for BiliClient {
    fn has_session(&self) -> bool {
        self.credentials.session().is_some()
    }
}

#[async_trait]
impl HistoryApi for BiliClient {
    async fn fetch_history_page(
        &self,
        cursor: HistoryCursor,
        page_size: u32,
    ) -> RemoteResult<HistoryPage> {
        let data: HistoryCursorData = self
            .get_json(
                "/x/web-interface/history/cursor",
                &[
                    ("max", cursor.max.to_string()),
                    ("view_at", cursor.view_at.to_string()),
                    ("type", "all".to_string()),
                    ("ps", page_size.to_string()),
                ],
            )
            .await?;
        debug!(
            max = cursor.max,
            view_at = cursor.view_at,
            items = data.list.len(),
            "fetched history page"
        );
        Ok(HistoryPage {
            items: data.list.into_iter().map(HistoryRecord::from).collect(),
            cursor: HistoryCursor {
                max: data.cursor.max,
                view_at: data.cursor.view_at,
            },
        })
    }

    async fn delete_history(&self, business: &Business, id: u64) -> RemoteResult<()> {
        let session = self.session()?;
        let (Some(cookie), Some(csrf)) = (session.write_cookie_header(), session.bili_jct.clone())
        else {
            return Err(RemoteError::MissingCsrfToken);
        };
        let kid = format!("{business}_{id}");
        let response = self
            .http
            .post(self.url("/x/v2/history/delete"))
            .header(COOKIE, cookie)
            .header(USER_AGENT, &self.config.user_agent)
            .header(REFERER, REFERER_URL)
            .form(&[("kid", kid.as_str()), ("csrf", csrf.as_str())])
            .send()
            .await?;
        let envelope = read_envelope::<IgnoredAny>(response).await?;
        if let Err(err) = envelope.check() {
            warn!(%kid, error = %err, "remote history delete rejected");
            return Err(err);
        }
        debug!(%kid, "deleted remote history item");
        Ok(())
    }
}

#[async_trait]
impl FavoritesApi for BiliClient {
    async fn current_mid(&self) -> RemoteResult<u64> {
        let nav: NavData = self.get_json("/x/web-interface/nav", &[]).await?;
        if !nav.is_login || nav.mid == 0 {
            return Err(RemoteError::NotLoggedIn);
        }
        Ok(nav.mid)
    }

    async fn list_folders(&self, mid: u64) -> RemoteResult<Vec<FavoriteFolder>> {
        let data: FolderListData = self
            .get_json(
                "/x/v3/fav/folder/created/list-all",
                &[("up_mid", mid.to_string())],
            )
            .await?;
        Ok(data.list.into_iter().map(FavoriteFolder::from).collect())
    }

    async fn list_resources(
        &self,
        media_id: u64,
        page: u32,
        page_size: u32,
    ) -> RemoteResult<ResourcePage> {
        let data: ResourceListData = self
            .get_json(
                "/x/v3/fav/resource/list",
                &[
                    ("media_id", media_id.to_string()),
                    ("pn", page.to_string()),
                    ("ps", page_size.to_string()),
                ],
            )
            .await?;
        Ok(ResourcePage {
            medias: data.medias.into_iter().map(Into::into).collect(),
            has_more: data.has_more,
        })
    }
}
