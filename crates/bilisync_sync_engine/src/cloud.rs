//! Cloud backup transports.
//!
//! A transport stores one [`BackupData`] document remotely. The WebDAV
//! transport keeps it at `<server>/bilibili-history-backup.json`.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bilisync_core::BackupData;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// File name of the backup document on the remote.
pub const BACKUP_FILENAME: &str = "bilibili-history-backup.json";

/// Stores and fetches the backup document.
#[async_trait]
pub trait BackupTransport: Send + Sync {
    /// Replaces the remote document.
    async fn upload(&self, data: &BackupData) -> SyncResult<()>;

    /// Fetches the remote document, or `None` if there is none.
    async fn download(&self) -> SyncResult<Option<BackupData>>;

    /// Returns true if the remote document exists.
    async fn check_exists(&self) -> SyncResult<bool>;
}

/// How to authenticate against the WebDAV server.
#[derive(Clone, PartialEq, Eq)]
pub enum WebDavAuth {
    /// No `Authorization` header.
    None,
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// A bearer token.
    Bearer(String),
}

impl WebDavAuth {
    fn header_value(&self) -> Option<String> {
        match self {
            WebDavAuth::None => None,
            WebDavAuth::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{username}:{password}"))
            )),
            WebDavAuth::Bearer(token) => Some(format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for WebDavAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebDavAuth::None => f.write_str("None"),
            WebDavAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            WebDavAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Configuration for [`WebDavTransport`].
#[derive(Debug, Clone)]
pub struct WebDavConfig {
    /// Directory URL the backup lives in.
    pub server_url: String,
    /// Credentials.
    pub auth: WebDavAuth,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl WebDavConfig {
    /// Creates a configuration without credentials.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            auth: WebDavAuth::None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Uses basic authentication.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = WebDavAuth::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Uses a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = WebDavAuth::Bearer(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stores the backup on a WebDAV server.
pub struct WebDavTransport {
    http: Client,
    config: WebDavConfig,
}

impl WebDavTransport {
    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebDavConfig) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// URL of the backup document.
    pub fn document_url(&self) -> String {
        format!("{}/{}", self.config.server_url, BACKUP_FILENAME)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.auth.header_value() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }
}

fn transport_error(action: &str, err: reqwest::Error) -> SyncError {
    SyncError::transport(format!("{action} failed: {err}"))
}

#[async_trait]
impl BackupTransport for WebDavTransport {
    async fn upload(&self, data: &BackupData) -> SyncResult<()> {
        let body = data
            .to_json()
            .map_err(|e| SyncError::backup(e.to_string()))?;
        let response = self
            .authorized(self.http.put(self.document_url()))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error("upload", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(format!("upload failed: {status}")));
        }
        info!(count = data.count, "backup uploaded");
        Ok(())
    }

    async fn download(&self) -> SyncResult<Option<BackupData>> {
        let response = self
            .authorized(self.http.get(self.document_url()))
            .send()
            .await
            .map_err(|e| transport_error("download", e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("no remote backup");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::transport(format!("download failed: {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("download", e))?;
        let data = BackupData::from_json(&bytes).map_err(|e| SyncError::backup(e.to_string()))?;
        info!(count = data.count, "backup downloaded");
        Ok(Some(data))
    }

    async fn check_exists(&self) -> SyncResult<bool> {
        let response = self
            .authorized(self.http.head(self.document_url()))
            .send()
            .await
            .map_err(|e| transport_error("existence check", e))?;
        Ok(response.status().is_success())
    }
}

/// Keeps the backup document in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    document: Mutex<Option<Vec<u8>>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored document bytes.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.document.lock().clone()
    }

    /// Replaces the stored document bytes.
    pub fn set_document(&self, bytes: Option<Vec<u8>>) {
        *self.document.lock() = bytes;
    }
}

#[async_trait]
impl BackupTransport for MemoryTransport {
    async fn upload(&self, data: &BackupData) -> SyncResult<()> {
        let bytes = data
            .to_json()
            .map_err(|e| SyncError::backup(e.to_string()))?;
        *self.document.lock() = Some(bytes);
        Ok(())
    }

    async fn download(&self) -> SyncResult<Option<BackupData>> {
        let Some(bytes) = self.document() else {
            return Ok(None);
        };
        BackupData::from_json(&bytes)
            .map(Some)
            .map_err(|e| SyncError::backup(e.to_string()))
    }

    async fn check_exists(&self) -> SyncResult<bool> {
        Ok(self.document.lock().is_some())
    }
}
