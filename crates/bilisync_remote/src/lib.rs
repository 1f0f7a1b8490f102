//! # bilisync remote
//!
//! Clients for the account endpoints the sync engines consume.
//!
//! This crate provides:
//! - [`HistoryApi`]: the cursor-paginated history listing and the history
//!   delete endpoint
//! - [`FavoritesApi`]: identity lookup, folder listing and paginated folder
//!   resources
//! - [`BiliClient`]: the `reqwest` implementation of both
//! - [`MockRemote`]: a scripted implementation that records every call
//!
//! Every response is wrapped in a `{code, message, data}` envelope; a
//! non-zero `code` becomes [`RemoteError::Api`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod client;
mod credentials;
mod error;
mod messages;
pub mod mock;

pub use api::{FavoritesApi, HistoryApi, HistoryCursor, HistoryPage, RemoteSession, ResourcePage};
pub use client::{BiliClient, ClientConfig, DEFAULT_BASE_URL};
pub use credentials::{CredentialProvider, SessionCredential, StaticCredentials};
pub use error::{RemoteError, RemoteResult, NOT_LOGGED_IN_CODE};
pub use messages::ApiEnvelope;
pub use mock::{MockRemote, RemoteCall};
