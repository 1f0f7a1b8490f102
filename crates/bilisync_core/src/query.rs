//! Filtered, paginated reads over the local store.
//!
//! History pages walk the `view_at` index downward and test every record
//! against a [`HistoryFilter`], so filters never need their own index.
//! Favorites are small enough to filter in memory and page by position.

use crate::error::{CoreError, CoreResult};
use crate::model::{Business, FavoriteResource, HistoryRecord};
use crate::store::LocalStore;
use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use std::str::FromStr;

/// Which fields a keyword is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Title or author, with BV/AV id shortcuts.
    #[default]
    All,
    /// Title only.
    Title,
    /// Author only.
    Author,
    /// Exact BV id.
    Bvid,
    /// Exact numeric id, `av` prefix optional.
    Id,
}

impl FromStr for SearchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "all" => Ok(Self::All),
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            "bvid" => Ok(Self::Bvid),
            "id" => Ok(Self::Id),
            other => Err(CoreError::invalid_operation(format!(
                "unknown search mode: {other}"
            ))),
        }
    }
}

/// Keyword predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeywordFilter {
    /// Matches everything.
    #[default]
    Any,
    /// BV or AV id when the keyword looks like one, else title or author.
    Composite(String),
    /// Case-insensitive substring of the title.
    Title(String),
    /// Case-insensitive substring of the author name.
    Author(String),
    /// Case-insensitive equality with the BV id.
    ExactBvid(String),
    /// Equality with the numeric id after stripping an `av` prefix.
    ExactAv(String),
}

/// The fields a keyword can look at.
struct Searchable<'a> {
    id: u64,
    bvids: [&'a str; 2],
    title: &'a str,
    author: &'a str,
}

impl KeywordFilter {
    /// Builds the predicate for `keyword` under `mode`. A blank keyword
    /// matches everything.
    #[must_use]
    pub fn new(mode: SearchMode, keyword: &str) -> Self {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Self::Any;
        }
        let lowered = keyword.to_lowercase();
        match mode {
            SearchMode::All => Self::Composite(lowered),
            SearchMode::Title => Self::Title(lowered),
            SearchMode::Author => Self::Author(lowered),
            SearchMode::Bvid => Self::ExactBvid(lowered),
            SearchMode::Id => Self::ExactAv(lowered),
        }
    }

    fn matches(&self, item: &Searchable<'_>) -> bool {
        match self {
            Self::Any => true,
            Self::Composite(keyword) => {
                (keyword.starts_with("bv") && bvid_equals(item, keyword))
                    || (keyword.starts_with("av") && id_equals(item, keyword))
                    || contains_folded(item.title, keyword)
                    || contains_folded(item.author, keyword)
            }
            Self::Title(keyword) => contains_folded(item.title, keyword),
            Self::Author(keyword) => contains_folded(item.author, keyword),
            Self::ExactBvid(keyword) => bvid_equals(item, keyword),
            Self::ExactAv(keyword) => id_equals(item, keyword),
        }
    }
}

fn contains_folded(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

fn bvid_equals(item: &Searchable<'_>, lowered: &str) -> bool {
    item.bvids
        .iter()
        .any(|bvid| !bvid.is_empty() && bvid.to_lowercase() == lowered)
}

fn id_equals(item: &Searchable<'_>, lowered: &str) -> bool {
    let digits = lowered.strip_prefix("av").unwrap_or(lowered);
    digits == item.id.to_string()
}

/// Inclusive calendar-date range, evaluated in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offset: FixedOffset,
}

impl Default for DateRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl DateRange {
    /// A range that admits every timestamp.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
            offset: Utc.fix(),
        }
    }

    /// Dates from `start` through `end`, both inclusive, in UTC.
    #[must_use]
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start,
            end,
            ..Self::unbounded()
        }
    }

    /// Evaluates the calendar dates in `offset` instead of UTC.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Parses `YYYY-MM-DD` bounds; empty strings mean no bound.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is not a valid date.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> CoreResult<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    /// Whether neither end is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn day_start(&self, date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
            - i64::from(self.offset.local_minus_utc())
    }

    /// Whether `unix_seconds` falls on a date inside the range.
    #[must_use]
    pub fn contains(&self, unix_seconds: i64) -> bool {
        if let Some(start) = self.start {
            if unix_seconds < self.day_start(start) {
                return false;
            }
        }
        if let Some(end) = self.end {
            if let Some(next_day) = end.succ_opt() {
                if unix_seconds >= self.day_start(next_day) {
                    return false;
                }
            }
        }
        true
    }
}

fn parse_date(value: Option<&str>) -> CoreResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| CoreError::invalid_format(format!("invalid date {text:?}: {e}"))),
    }
}

/// Predicate for history queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Keyword predicate.
    pub keyword: KeywordFilter,
    /// Category filter; `None` admits all categories.
    pub business: Option<Business>,
    /// Range over `view_at`.
    pub dates: DateRange,
}

impl HistoryFilter {
    /// Whether `record` passes every part of the filter.
    #[must_use]
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        let searchable = Searchable {
            id: record.id,
            bvids: [&record.bvid, ""],
            title: &record.title,
            author: &record.author_name,
        };
        self.keyword.matches(&searchable)
            && self
                .business
                .as_ref()
                .map_or(true, |filter| record.business.matches_filter(filter))
            && self.dates.contains(record.view_at)
    }
}

/// Predicate for favorites queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesFilter {
    /// Keyword predicate.
    pub keyword: KeywordFilter,
    /// Range over `fav_time`, or `ctime` when `fav_time` is unset.
    pub dates: DateRange,
}

impl FavoritesFilter {
    /// Whether `resource` passes every part of the filter.
    #[must_use]
    pub fn matches(&self, resource: &FavoriteResource) -> bool {
        let searchable = Searchable {
            id: resource.id,
            bvids: [&resource.bvid, &resource.bv_id],
            title: &resource.title,
            author: &resource.upper.name,
        };
        self.keyword.matches(&searchable) && self.dates.contains(resource.favorited_at())
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage<T> {
    /// Matching items in page order.
    pub items: Vec<T>,
    /// Whether another request may return more items.
    pub has_more: bool,
}

impl LocalStore {
    /// Returns up to `page_size` matching history records with
    /// `view_at < after_view_at`, newest first.
    ///
    /// `has_more` is set when the page filled up while unscanned records
    /// remained. Those records are not tested against the filter, so the
    /// next page can come back empty.
    #[must_use]
    pub fn query_history(
        &self,
        after_view_at: Option<i64>,
        page_size: usize,
        filter: &HistoryFilter,
    ) -> QueryPage<HistoryRecord> {
        let mut scan = self.scan_history_desc(after_view_at);
        let mut items = Vec::with_capacity(page_size.min(256));

        while items.len() < page_size {
            let Some(record) = scan.next() else {
                return QueryPage {
                    items,
                    has_more: false,
                };
            };
            if filter.matches(&record) {
                items.push(record);
            }
        }

        QueryPage {
            items,
            has_more: scan.has_remaining(),
        }
    }

    /// Returns up to `limit` matching resources ordered by folder position.
    ///
    /// With `folder_id` unset all folders are searched. `after_item` is the
    /// id of the last resource of the previous page; if it is not among the
    /// matches the listing restarts from the beginning.
    #[must_use]
    pub fn query_favorites(
        &self,
        folder_id: Option<u64>,
        filter: &FavoritesFilter,
        after_item: Option<u64>,
        limit: usize,
    ) -> QueryPage<FavoriteResource> {
        let candidates = match folder_id {
            Some(folder) => self.resources_in_folder(folder),
            None => self.all_resources(),
        };
        let mut matched: Vec<FavoriteResource> =
            candidates.into_iter().filter(|r| filter.matches(r)).collect();
        matched.sort_by_key(|r| (r.index, r.id));

        let start = after_item
            .and_then(|id| matched.iter().position(|r| r.id == id))
            .map_or(0, |pos| pos + 1);
        let remaining = matched.len() - start;
        let items: Vec<FavoriteResource> = matched.into_iter().skip(start).take(limit).collect();

        QueryPage {
            items,
            has_more: remaining > limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Upper;

    fn record(id: u64, view_at: i64, business: Business) -> HistoryRecord {
        HistoryRecord {
            id,
            view_at,
            business,
            bvid: format!("BV1xx{id}"),
            title: format!("Episode {id}"),
            author_name: "Uploader".to_string(),
            ..Default::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2024-03-01T00:00:00Z
    const MARCH_1: i64 = 1_709_251_200;
    const DAY: i64 = 86_400;

    #[test]
    fn search_mode_parse() {
        assert_eq!("bvid".parse::<SearchMode>().unwrap(), SearchMode::Bvid);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn blank_keyword_matches_all() {
        assert_eq!(KeywordFilter::new(SearchMode::Title, "  "), KeywordFilter::Any);
    }

    #[test]
    fn composite_handles_id_prefixes() {
        let item = record(170001, 0, Business::Archive);
        let matches = |kw: &str| HistoryFilter {
            keyword: KeywordFilter::new(SearchMode::All, kw),
            ..Default::default()
        }
        .matches(&item);

        assert!(matches("bv1XX170001"));
        assert!(matches("AV170001"));
        assert!(matches("episode"));
        assert!(matches("upload"));
        assert!(!matches("bv1xx9"));
        assert!(!matches("av9"));
    }

    #[test]
    fn exact_modes() {
        let item = record(42, 0, Business::Archive);
        let with = |mode, kw: &str| HistoryFilter {
            keyword: KeywordFilter::new(mode, kw),
            ..Default::default()
        }
        .matches(&item);

        assert!(with(SearchMode::Bvid, "bv1xx42"));
        assert!(!with(SearchMode::Bvid, "bv1xx4"));
        assert!(with(SearchMode::Id, "42"));
        assert!(with(SearchMode::Id, "av42"));
        assert!(!with(SearchMode::Id, "4"));
        assert!(with(SearchMode::Author, "UPLOADER"));
        assert!(!with(SearchMode::Title, "uploader"));
    }

    #[test]
    fn date_range_is_inclusive_of_whole_days() {
        let range = DateRange::new(Some(date(2024, 3, 1)), Some(date(2024, 3, 2)));
        assert!(!range.contains(MARCH_1 - 1));
        assert!(range.contains(MARCH_1));
        assert!(range.contains(MARCH_1 + 2 * DAY - 1));
        assert!(!range.contains(MARCH_1 + 2 * DAY));
    }

    #[test]
    fn date_range_respects_offset() {
        let utc8 = FixedOffset::east_opt(8 * 3600).unwrap();
        let range = DateRange::new(Some(date(2024, 3, 1)), None).with_offset(utc8);
        // 2024-03-01 00:00 in UTC+8 is 2024-02-29 16:00 UTC
        assert!(range.contains(MARCH_1 - 8 * 3600));
        assert!(!range.contains(MARCH_1 - 8 * 3600 - 1));
    }

    #[test]
    fn date_range_parse() {
        let range = DateRange::parse(Some("2024-03-01"), Some("")).unwrap();
        assert!(!range.is_unbounded());
        assert!(range.contains(i64::MAX / 2));
        assert!(DateRange::parse(Some("03/01/2024"), None).is_err());
    }

    #[test]
    fn filters_compose_and_order_descending() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put_history_many(&[
                record(1, MARCH_1 - DAY, Business::Live),
                record(2, MARCH_1 + 10, Business::Live),
                record(3, MARCH_1 + 20, Business::Archive),
                record(4, MARCH_1 + DAY + 30, Business::Live),
                record(5, MARCH_1 + 3 * DAY, Business::Live),
            ])
            .unwrap();

        let filter = HistoryFilter {
            business: Some(Business::Live),
            dates: DateRange::new(Some(date(2024, 3, 1)), Some(date(2024, 3, 2))),
            ..Default::default()
        };
        let page = store.query_history(None, 10, &filter);
        let ids: Vec<u64> = page.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert!(!page.has_more);
    }

    #[test]
    fn cursor_excludes_bound_and_above() {
        let store = LocalStore::open_in_memory().unwrap();
        let records: Vec<_> = (1..=6).map(|i| record(i, i as i64 * 100, Business::Archive)).collect();
        store.put_history_many(&records).unwrap();

        let page = store.query_history(Some(400), 10, &HistoryFilter::default());
        assert!(page.items.iter().all(|r| r.view_at < 400));
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn has_more_over_reports_when_page_fills() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put_history_many(&[
                record(1, 100, Business::Archive),
                record(2, 200, Business::Live),
                record(3, 300, Business::Live),
            ])
            .unwrap();
        let live = HistoryFilter {
            business: Some(Business::Live),
            ..Default::default()
        };

        let first = store.query_history(None, 2, &live);
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);

        let after = first.items.last().map(|r| r.view_at);
        let second = store.query_history(after, 2, &live);
        assert!(second.items.is_empty());
        assert!(!second.has_more);
    }

    #[test]
    fn article_filter_includes_article_lists() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put_history_many(&[
                record(1, 1, Business::Article),
                record(2, 2, Business::ArticleList),
                record(3, 3, Business::Archive),
            ])
            .unwrap();
        let filter = HistoryFilter {
            business: Some(Business::Article),
            ..Default::default()
        };
        assert_eq!(store.query_history(None, 10, &filter).items.len(), 2);
    }

    fn fav(id: u64, folder_id: u64, index: u32, title: &str) -> FavoriteResource {
        FavoriteResource {
            id,
            folder_id,
            index,
            title: title.to_string(),
            bv_id: format!("BV{id}"),
            upper: Upper {
                name: "someone".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn favorites_page_by_position() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put_resources(&[
                fav(1, 9, 2, "c"),
                fav(2, 9, 0, "a"),
                fav(3, 9, 1, "b"),
                fav(4, 8, 0, "other folder"),
            ])
            .unwrap();
        let all = FavoritesFilter::default();

        let first = store.query_favorites(Some(9), &all, None, 2);
        assert_eq!(first.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(first.has_more);

        let second = store.query_favorites(Some(9), &all, Some(3), 2);
        assert_eq!(second.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
        assert!(!second.has_more);

        let exact = store.query_favorites(Some(9), &all, None, 3);
        assert!(!exact.has_more);

        let restarted = store.query_favorites(Some(9), &all, Some(999), 1);
        assert_eq!(restarted.items[0].id, 2);

        assert_eq!(store.query_favorites(None, &all, None, 10).items.len(), 4);
    }

    #[test]
    fn favorites_match_either_bvid_field() {
        let store = LocalStore::open_in_memory().unwrap();
        store.put_resources(&[fav(5, 1, 0, "x")]).unwrap();
        let filter = FavoritesFilter {
            keyword: KeywordFilter::new(SearchMode::Bvid, "bv5"),
            ..Default::default()
        };
        assert_eq!(store.query_favorites(Some(1), &filter, None, 10).items.len(), 1);
    }
}
