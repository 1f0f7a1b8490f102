//! Error types for the sync engine.

use crate::state::SyncKind;
use bilisync_core::CoreError;
use bilisync_remote::RemoteError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No session credential, or the remote rejected it.
    #[error("not logged in")]
    NotLoggedIn,

    /// A run of this kind is already in progress.
    #[error("{0} sync already in progress")]
    Busy(SyncKind),

    /// The remote failed or answered with an error.
    #[error("remote error: {0}")]
    Remote(RemoteError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// The settings store failed or holds a malformed value.
    #[error("settings error: {0}")]
    Settings(String),

    /// A backup document could not be produced or applied.
    #[error("backup error: {0}")]
    Backup(String),

    /// The cloud backup transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SyncError {
    /// Creates a settings error.
    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings(message.into())
    }

    /// Creates a backup error.
    pub fn backup(message: impl Into<String>) -> Self {
        Self::Backup(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true if the error means the session is missing or invalid.
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::NotLoggedIn => true,
            SyncError::Remote(err) => err.is_auth(),
            _ => false,
        }
    }

    /// Returns true if the run was refused because another was in progress.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy(_))
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotLoggedIn => SyncError::NotLoggedIn,
            other => SyncError::Remote(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors() {
        assert!(SyncError::NotLoggedIn.is_auth());
        assert!(SyncError::from(RemoteError::NotLoggedIn).is_auth());
        assert!(SyncError::from(RemoteError::MissingCsrfToken).is_auth());
        assert!(!SyncError::from(RemoteError::Http { status: 500 }).is_auth());
        assert!(!SyncError::Busy(SyncKind::History).is_auth());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::Busy(SyncKind::Favorites).to_string(),
            "favorites sync already in progress"
        );
        assert_eq!(
            SyncError::from(RemoteError::api(-352, "风控校验失败")).to_string(),
            "remote error: api error -352: 风控校验失败"
        );
        assert!(SyncError::Busy(SyncKind::History).is_busy());
    }
}
