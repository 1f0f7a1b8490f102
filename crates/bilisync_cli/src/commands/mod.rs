//! CLI command implementations.

pub mod backup;
pub mod compact;
pub mod daemon;
pub mod delete;
pub mod query;
pub mod status;
pub mod sync;

use bilisync_core::{Config, LocalStore};
use bilisync_remote::{BiliClient, ClientConfig, StaticCredentials};
use bilisync_sync_engine::{
    JsonFileSettings, Settings, SyncConfig, SyncCoordinator, SyncOutcome, SyncService,
    SyncStateMachine, WebDavConfig, WebDavTransport,
};
use chrono::{DateTime, FixedOffset, Local, Offset};
use clap::Args;
use std::path::Path;
use std::sync::Arc;

/// Result type of command implementations.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Name of the settings file inside the store directory.
const SETTINGS_FILE: &str = "settings.json";

/// Session cookies from flags or environment.
#[derive(Default)]
pub struct Credentials {
    /// `SESSDATA` cookie.
    pub sessdata: Option<String>,
    /// `bili_jct` cookie.
    pub bili_jct: Option<String>,
}

/// WebDAV server of the cloud backup.
#[derive(Args)]
pub struct WebDavArgs {
    /// Directory URL on the WebDAV server
    #[arg(long, env = "BILISYNC_WEBDAV_URL")]
    url: String,

    /// WebDAV user name
    #[arg(long, env = "BILISYNC_WEBDAV_USER")]
    username: Option<String>,

    /// WebDAV password
    #[arg(long, env = "BILISYNC_WEBDAV_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl WebDavArgs {
    fn config(&self) -> WebDavConfig {
        let config = WebDavConfig::new(self.url.as_str());
        match &self.username {
            Some(username) => {
                config.with_basic_auth(username.as_str(), self.password.clone().unwrap_or_default())
            }
            None => config,
        }
    }

    /// Builds the transport.
    pub fn transport(&self) -> CliResult<Arc<WebDavTransport>> {
        Ok(Arc::new(WebDavTransport::new(self.config())?))
    }
}

/// Opens the store in `path`, creating it if missing.
pub fn open_store(path: &Path) -> CliResult<Arc<LocalStore>> {
    Ok(Arc::new(LocalStore::open(path, Config::default())?))
}

/// Builds the service over the store and settings in `path`.
pub fn open_service(
    path: &Path,
    credentials: Credentials,
    config: &SyncConfig,
) -> CliResult<SyncService> {
    let store = open_store(path)?;
    let settings = Settings::new(Arc::new(JsonFileSettings::open(path.join(SETTINGS_FILE))?));
    let state = Arc::new(SyncStateMachine::new(settings, config));

    let credentials = Arc::new(StaticCredentials::from_cookies(
        credentials.sessdata,
        credentials.bili_jct,
    ));
    let remote = Arc::new(BiliClient::new(ClientConfig::default(), credentials)?);
    let coordinator = Arc::new(SyncCoordinator::new(
        store.clone(),
        remote.clone(),
        state,
        config.clone(),
    ));
    Ok(SyncService::new(store, coordinator, remote))
}

/// Prints a successful outcome, or turns a failed one into an error.
pub fn report(outcome: SyncOutcome) -> CliResult<()> {
    if outcome.success {
        println!("✓ {}", outcome.message.unwrap_or_default());
        Ok(())
    } else {
        Err(outcome.error.unwrap_or_else(|| "operation failed".to_string()).into())
    }
}

/// The local UTC offset, used to evaluate date filters.
pub fn local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

/// Formats Unix seconds as local date and time.
pub fn format_time(unix_seconds: i64) -> String {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}

/// Formats Unix milliseconds as local date and time.
pub fn format_millis(unix_millis: i64) -> String {
    format_time(unix_millis.div_euclid(1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webdav_config_uses_basic_auth_with_user() {
        let args = WebDavArgs {
            url: "https://dav.example.com/backups/".to_string(),
            username: Some("me".to_string()),
            password: None,
        };
        let config = args.config();
        assert_eq!(config.server_url, "https://dav.example.com/backups");
        assert!(matches!(
            config.auth,
            bilisync_sync_engine::WebDavAuth::Basic { ref password, .. } if password.is_empty()
        ));
    }

    #[test]
    fn failed_outcome_becomes_error() {
        let ok = SyncOutcome::ok("done");
        assert!(report(ok).is_ok());

        let failed = SyncOutcome::failed(&bilisync_sync_engine::SyncError::NotLoggedIn);
        let err = report(failed).unwrap_err();
        assert_eq!(err.to_string(), "not logged in");
    }

    #[test]
    fn service_opens_in_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let service = open_service(&path, Credentials::default(), &SyncConfig::new()).unwrap();
        assert_eq!(service.total_history_count(), 0);
        assert!(!service.status().unwrap().has_completed_full_history_sync);
    }
}
