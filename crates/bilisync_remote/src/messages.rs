//! Wire types for the remote endpoints.
//!
//! Every field defaults so a missing or `null` value never fails a page;
//! conversion into the store's model types happens here.

use crate::error::{RemoteError, RemoteResult};
use bilisync_core::{Business, CntInfo, FavoriteFolder, FavoriteResource, HistoryRecord, Upper};
use serde::{Deserialize, Deserializer};

/// The `{code, message, data}` wrapper every endpoint responds with.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Zero on success.
    #[serde(default)]
    pub code: i64,
    /// Human-readable status.
    #[serde(default)]
    pub message: String,
    /// Payload; absent on most errors.
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Fails on a non-zero code.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Api`], or [`RemoteError::NotLoggedIn`] for the
    /// session code.
    pub fn check(&self) -> RemoteResult<()> {
        if self.code != 0 {
            return Err(RemoteError::api(self.code, self.message.clone()));
        }
        Ok(())
    }

    /// Returns the payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-zero code or a missing payload.
    pub fn into_data(self) -> RemoteResult<T> {
        self.check()?;
        self.data
            .ok_or_else(|| RemoteError::Decode("envelope has no data".into()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ----- history -----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HistoryCursorData {
    #[serde(deserialize_with = "null_as_default")]
    pub list: Vec<WireHistoryItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub cursor: WireCursor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireCursor {
    pub max: u64,
    pub view_at: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireHistoryItem {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tag_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cover: String,
    #[serde(deserialize_with = "null_as_default")]
    pub covers: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub uri: String,
    #[serde(deserialize_with = "null_as_default")]
    pub history: WireHistoryKey,
    pub view_at: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub author_name: String,
    pub author_mid: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireHistoryKey {
    pub oid: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub bvid: String,
    pub cid: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub business: String,
}

impl From<WireHistoryItem> for HistoryRecord {
    fn from(item: WireHistoryItem) -> Self {
        let cover = if item.cover.is_empty() {
            item.covers.into_iter().next().unwrap_or_default()
        } else {
            item.cover
        };
        HistoryRecord {
            id: item.history.oid,
            business: Business::parse(&item.history.business),
            bvid: item.history.bvid,
            cid: item.history.cid,
            title: item.title,
            tag_name: item.tag_name,
            cover,
            view_at: item.view_at,
            author_name: item.author_name,
            author_mid: item.author_mid,
            uri: item.uri,
            synced_at: 0,
        }
    }
}

// ----- favorites -----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NavData {
    #[serde(rename = "isLogin")]
    pub is_login: bool,
    pub mid: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FolderListData {
    #[serde(deserialize_with = "null_as_default")]
    pub list: Vec<WireFolder>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireFolder {
    pub id: u64,
    pub fid: u64,
    pub mid: u64,
    pub attr: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub fav_state: u32,
    pub media_count: u32,
}

impl From<WireFolder> for FavoriteFolder {
    fn from(folder: WireFolder) -> Self {
        FavoriteFolder {
            id: folder.id,
            fid: folder.fid,
            mid: folder.mid,
            attr: folder.attr,
            title: folder.title,
            fav_state: folder.fav_state,
            media_count: folder.media_count,
            index: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResourceListData {
    #[serde(deserialize_with = "null_as_default")]
    pub medias: Vec<WireMedia>,
    pub has_more: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireMedia {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cover: String,
    #[serde(deserialize_with = "null_as_default")]
    pub intro: String,
    pub duration: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub upper: WireUpper,
    #[serde(deserialize_with = "null_as_default")]
    pub cnt_info: WireCntInfo,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    pub ctime: i64,
    pub pubtime: i64,
    pub fav_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub bv_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bvid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireUpper {
    pub mid: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub face: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireCntInfo {
    pub collect: u64,
    pub play: u64,
    pub danmaku: u64,
}

impl From<WireMedia> for FavoriteResource {
    fn from(media: WireMedia) -> Self {
        let bv_id = if media.bv_id.is_empty() {
            media.bvid.clone()
        } else {
            media.bv_id
        };
        FavoriteResource {
            id: media.id,
            kind: media.kind,
            title: media.title,
            cover: media.cover,
            intro: media.intro,
            duration: media.duration,
            upper: Upper {
                mid: media.upper.mid,
                name: media.upper.name,
                face: media.upper.face,
            },
            cnt_info: CntInfo {
                collect: media.cnt_info.collect,
                play: media.cnt_info.play,
                danmaku: media.cnt_info.danmaku,
            },
            link: media.link,
            ctime: media.ctime,
            pubtime: media.pubtime,
            fav_time: media.fav_time,
            bv_id,
            bvid: media.bvid,
            folder_id: 0,
            index: 0,
        }
    }
}
