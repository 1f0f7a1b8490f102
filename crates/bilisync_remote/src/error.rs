//! Error types for the remote clients.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Envelope code the remote uses for requests without a valid session.
pub const NOT_LOGGED_IN_CODE: i64 = -101;

/// Errors that can occur while talking to the remote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No session credential is available, or the remote rejected it.
    #[error("not logged in")]
    NotLoggedIn,

    /// The request needs the CSRF cookie and the session has none.
    #[error("session has no csrf token")]
    MissingCsrfToken,

    /// The remote answered with a non-success HTTP status.
    #[error("http status {status}")]
    Http {
        /// Status code.
        status: u16,
    },

    /// The envelope carried a non-zero code.
    #[error("api error {code}: {message}")]
    Api {
        /// Envelope code.
        code: i64,
        /// Envelope message.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Creates an API error from an envelope.
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        if code == NOT_LOGGED_IN_CODE {
            return Self::NotLoggedIn;
        }
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the error means the session is missing or invalid.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            RemoteError::NotLoggedIn | RemoteError::MissingCsrfToken
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Http {
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
