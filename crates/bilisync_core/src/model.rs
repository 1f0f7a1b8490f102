//! Records mirrored from the remote account.
//!
//! Every field has a serde default so frames written by older builds keep
//! decoding after fields are added.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Title the remote API substitutes for favorites whose video was taken down.
pub const INVALIDATED_TITLE: &str = "已失效视频";

/// Content category of a history entry, as named on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Business {
    /// Regular video (`archive`).
    #[default]
    Archive,
    /// Bangumi or film episode (`pgc`).
    Pgc,
    /// Live room (`live`).
    Live,
    /// Column article (`article`).
    Article,
    /// Article collection (`article-list`).
    ArticleList,
    /// Paid course (`cheese`).
    Cheese,
    /// A value this build does not know; kept verbatim.
    Unknown(String),
}

impl Business {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Archive => "archive",
            Self::Pgc => "pgc",
            Self::Live => "live",
            Self::Article => "article",
            Self::ArticleList => "article-list",
            Self::Cheese => "cheese",
            Self::Unknown(other) => other,
        }
    }

    /// Parses a wire value. Never fails; unknown values become [`Business::Unknown`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "archive" => Self::Archive,
            "pgc" => Self::Pgc,
            "live" => Self::Live,
            "article" => Self::Article,
            "article-list" => Self::ArticleList,
            "cheese" => Self::Cheese,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether a record of this category passes a category filter.
    ///
    /// Filtering by `article` also admits `article-list`.
    #[must_use]
    pub fn matches_filter(&self, filter: &Business) -> bool {
        match (filter, self) {
            (Self::Article, Self::ArticleList) => true,
            _ => filter == self,
        }
    }
}

impl From<String> for Business {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Business> for String {
    fn from(value: Business) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Business {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One watched item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    /// Remote content id (`oid`), the primary key.
    pub id: u64,
    /// Content category.
    pub business: Business,
    /// BV id, empty for non-video entries.
    pub bvid: String,
    /// Part id for multi-part videos.
    pub cid: u64,
    /// Display title.
    pub title: String,
    /// Optional sub-category label.
    pub tag_name: String,
    /// Cover image URL.
    pub cover: String,
    /// When the item was watched, Unix seconds. Ordering key.
    pub view_at: i64,
    /// Uploader name.
    pub author_name: String,
    /// Uploader account id.
    pub author_mid: u64,
    /// Link for entries that are not plain videos.
    pub uri: String,
    /// When this copy was written locally, Unix milliseconds.
    pub synced_at: i64,
}

/// Uploader of a favorited resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Upper {
    /// Account id.
    pub mid: u64,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub face: String,
}

/// Counters of a favorited resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CntInfo {
    /// Times favorited.
    pub collect: u64,
    /// Play count.
    pub play: u64,
    /// Danmaku count.
    pub danmaku: u64,
}

/// A remote favorite folder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoriteFolder {
    /// Folder id (`media_id`), the primary key.
    pub id: u64,
    /// Original folder id.
    pub fid: u64,
    /// Owner account id.
    pub mid: u64,
    /// Attribute bits (privacy, default folder).
    pub attr: u32,
    /// Folder title.
    pub title: String,
    /// Whether the current resource is in the folder (unused for listings).
    pub fav_state: u32,
    /// Number of resources as reported remotely.
    pub media_count: u32,
    /// Position in the remote folder list at last sync.
    pub index: u32,
}

/// One resource inside a favorite folder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoriteResource {
    /// Resource id, the primary key.
    pub id: u64,
    /// Resource kind (2 = video).
    #[serde(rename = "type")]
    pub kind: u32,
    /// Display title.
    pub title: String,
    /// Cover image URL.
    pub cover: String,
    /// Description.
    pub intro: String,
    /// Length in seconds.
    pub duration: u32,
    /// Uploader.
    pub upper: Upper,
    /// Counters.
    pub cnt_info: CntInfo,
    /// Deep link.
    pub link: String,
    /// Creation time, Unix seconds.
    pub ctime: i64,
    /// Publish time, Unix seconds.
    pub pubtime: i64,
    /// When it was favorited, Unix seconds; 0 when unknown.
    pub fav_time: i64,
    /// BV id as returned by the folder listing.
    pub bv_id: String,
    /// BV id under its alternative name.
    pub bvid: String,
    /// Folder this resource was synced from.
    pub folder_id: u64,
    /// Position inside the folder at last sync.
    pub index: u32,
}

impl FavoriteResource {
    /// Whether the remote replaced this resource's metadata with a placeholder.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.title == INVALIDATED_TITLE
    }

    /// The BV id, whichever field carries it.
    #[must_use]
    pub fn effective_bvid(&self) -> &str {
        if self.bvid.is_empty() {
            &self.bv_id
        } else {
            &self.bvid
        }
    }

    /// Timestamp used for date filtering: `fav_time`, or `ctime` when unset.
    #[must_use]
    pub fn favorited_at(&self) -> i64 {
        if self.fav_time != 0 {
            self.fav_time
        } else {
            self.ctime
        }
    }

    /// Keeps the display fields of `prior` when this copy is an invalidated
    /// placeholder and `prior` still has real metadata.
    ///
    /// Folder linkage and position always come from `self`.
    #[must_use]
    pub fn preserving_display_of(mut self, prior: Option<&FavoriteResource>) -> Self {
        let Some(prior) = prior else {
            return self;
        };
        if self.is_invalidated() && !prior.is_invalidated() {
            self.title.clone_from(&prior.title);
            self.cover.clone_from(&prior.cover);
            self.intro.clone_from(&prior.intro);
            self.upper = prior.upper.clone();
            self.ctime = prior.ctime;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_wire_values() {
        for wire in ["archive", "pgc", "live", "article", "article-list", "cheese"] {
            assert_eq!(Business::parse(wire).as_str(), wire);
        }
        assert_eq!(
            Business::parse("ogv"),
            Business::Unknown("ogv".to_string())
        );
    }

    #[test]
    fn business_serde_uses_wire_string() {
        let json = serde_json::to_string(&Business::ArticleList).unwrap();
        assert_eq!(json, "\"article-list\"");
        let back: Business = serde_json::from_str("\"something-new\"").unwrap();
        assert_eq!(back, Business::Unknown("something-new".to_string()));
    }

    #[test]
    fn article_filter_admits_article_list() {
        assert!(Business::ArticleList.matches_filter(&Business::Article));
        assert!(Business::Article.matches_filter(&Business::Article));
        assert!(!Business::Article.matches_filter(&Business::ArticleList));
        assert!(!Business::Live.matches_filter(&Business::Archive));
    }

    #[test]
    fn effective_bvid_falls_back() {
        let mut res = FavoriteResource {
            bv_id: "BV1a".to_string(),
            ..Default::default()
        };
        assert_eq!(res.effective_bvid(), "BV1a");
        res.bvid = "BV1b".to_string();
        assert_eq!(res.effective_bvid(), "BV1b");
    }

    #[test]
    fn favorited_at_falls_back_to_ctime() {
        let res = FavoriteResource {
            ctime: 100,
            ..Default::default()
        };
        assert_eq!(res.favorited_at(), 100);
        let res = FavoriteResource {
            ctime: 100,
            fav_time: 200,
            ..Default::default()
        };
        assert_eq!(res.favorited_at(), 200);
    }

    #[test]
    fn invalidated_copy_keeps_prior_display_fields() {
        let prior = FavoriteResource {
            id: 7,
            title: "Real Title".to_string(),
            cover: "http://i0.hdslb.com/real.jpg".to_string(),
            intro: "intro".to_string(),
            upper: Upper {
                mid: 9,
                name: "up".to_string(),
                face: String::new(),
            },
            ctime: 1_600_000_000,
            folder_id: 1,
            index: 0,
            ..Default::default()
        };
        let incoming = FavoriteResource {
            id: 7,
            title: INVALIDATED_TITLE.to_string(),
            folder_id: 2,
            index: 5,
            ..Default::default()
        };

        let merged = incoming.preserving_display_of(Some(&prior));
        assert_eq!(merged.title, "Real Title");
        assert_eq!(merged.cover, prior.cover);
        assert_eq!(merged.upper, prior.upper);
        assert_eq!(merged.ctime, prior.ctime);
        assert_eq!(merged.folder_id, 2);
        assert_eq!(merged.index, 5);
    }

    #[test]
    fn invalidated_prior_is_not_preserved() {
        let prior = FavoriteResource {
            title: INVALIDATED_TITLE.to_string(),
            ..Default::default()
        };
        let incoming = FavoriteResource {
            title: INVALIDATED_TITLE.to_string(),
            index: 3,
            ..Default::default()
        };
        let merged = incoming.clone().preserving_display_of(Some(&prior));
        assert_eq!(merged, incoming);
    }
}
