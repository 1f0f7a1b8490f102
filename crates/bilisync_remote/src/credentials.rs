//! Session credentials.

use parking_lot::RwLock;
use std::fmt;

/// Cookies identifying a logged-in session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    /// The `SESSDATA` cookie.
    pub sessdata: String,
    /// The `bili_jct` cookie, used as the CSRF token for writes.
    pub bili_jct: Option<String>,
}

impl SessionCredential {
    /// Creates a read-only credential.
    pub fn new(sessdata: impl Into<String>) -> Self {
        Self {
            sessdata: sessdata.into(),
            bili_jct: None,
        }
    }

    /// Adds the CSRF cookie.
    pub fn with_bili_jct(mut self, bili_jct: impl Into<String>) -> Self {
        self.bili_jct = Some(bili_jct.into());
        self
    }

    /// The `Cookie` header value for read requests.
    pub fn cookie_header(&self) -> String {
        format!("SESSDATA={}", self.sessdata)
    }

    /// The `Cookie` header value for writes, if the CSRF cookie is known.
    pub fn write_cookie_header(&self) -> Option<String> {
        self.bili_jct
            .as_ref()
            .map(|jct| format!("SESSDATA={}; bili_jct={}", self.sessdata, jct))
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("sessdata", &"<redacted>")
            .field("bili_jct", &self.bili_jct.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies the current session, or `None` when logged out.
///
/// Called once per request, so a provider may change its answer between
/// calls.
pub trait CredentialProvider: Send + Sync {
    /// Returns the current session.
    fn session(&self) -> Option<SessionCredential>;
}

/// A credential set by the caller, replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    current: RwLock<Option<SessionCredential>>,
}

impl StaticCredentials {
    /// Creates a provider holding `credential`.
    pub fn new(credential: SessionCredential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }

    /// Creates a logged-out provider.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a provider from optional cookie values; an empty `SESSDATA`
    /// counts as logged out.
    pub fn from_cookies(sessdata: Option<String>, bili_jct: Option<String>) -> Self {
        let credential = sessdata.filter(|s| !s.is_empty()).map(|sessdata| {
            let credential = SessionCredential::new(sessdata);
            match bili_jct.filter(|j| !j.is_empty()) {
                Some(jct) => credential.with_bili_jct(jct),
                None => credential,
            }
        });
        Self {
            current: RwLock::new(credential),
        }
    }

    /// Replaces the session.
    pub fn set(&self, credential: Option<SessionCredential>) {
        *self.current.write() = credential;
    }
}

impl CredentialProvider for StaticCredentials {
    fn session(&self) -> Option<SessionCredential> {
        self.current.read().clone()
    }
}
