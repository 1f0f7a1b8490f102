//! # bilisync core
//!
//! The local store that mirrors an account's viewing history and favorites.
//!
//! This crate provides:
//! - An append-only record log with checksummed frames and compaction
//! - In-memory collections with an ordered secondary index per record type
//! - [`LocalStore`]: upsert, delete, count and descending cursor scans
//! - The query layer: keyword, category and date filters with pagination
//! - JSON backup snapshots of history
//!
//! Writes go to the log first and are then applied in memory; opening a
//! store replays the log.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod collection;
mod config;
mod dir;
mod error;
mod index;
pub mod log;
mod model;
mod query;
mod store;
mod types;

pub use backup::{BackupData, BACKUP_VERSION};
pub use collection::{Collection, Record};
pub use config::Config;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use index::BTreeIndex;
pub use model::{
    Business, CntInfo, FavoriteFolder, FavoriteResource, HistoryRecord, Upper, INVALIDATED_TITLE,
};
pub use query::{
    DateRange, FavoritesFilter, HistoryFilter, KeywordFilter, QueryPage, SearchMode,
};
pub use store::{HistoryScan, LocalStore, StoreStats};
pub use types::{now_millis, CollectionId, SequenceNumber};
