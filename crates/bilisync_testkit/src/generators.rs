//! Test data builders and property-based generators.
//!
//! The builders produce records with predictable, distinct fields; the
//! strategies produce random data that keeps the invariants the remote
//! guarantees (unique ids, unique descending `view_at`).

use bilisync_core::{Business, CntInfo, FavoriteFolder, FavoriteResource, HistoryRecord, Upper};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// A history record with id `id` watched at `view_at` (Unix seconds).
pub fn history(id: u64, view_at: i64) -> HistoryRecord {
    HistoryRecord {
        id,
        business: Business::Archive,
        bvid: format!("BV1{id:09}"),
        cid: id * 10,
        title: format!("video {id}"),
        tag_name: "tech".to_string(),
        cover: format!("https://i0.hdslb.com/cover/{id}.jpg"),
        view_at,
        author_name: format!("author {}", id % 7),
        author_mid: 1000 + id % 7,
        uri: String::new(),
        synced_at: 0,
    }
}

/// `count` records with ids from `first_id`, newest first, one minute
/// apart starting at `newest_view_at`.
pub fn history_run(first_id: u64, count: usize, newest_view_at: i64) -> Vec<HistoryRecord> {
    (0..count)
        .map(|i| history(first_id + i as u64, newest_view_at - 60 * i as i64))
        .collect()
}

/// A folder of account `mid`.
pub fn folder(id: u64, mid: u64, title: &str) -> FavoriteFolder {
    FavoriteFolder {
        id,
        fid: id / 100,
        mid,
        attr: 0,
        title: title.to_string(),
        fav_state: 0,
        media_count: 0,
        index: 0,
    }
}

/// A favorited video with id `id` and `title`.
pub fn resource(id: u64, title: &str) -> FavoriteResource {
    FavoriteResource {
        id,
        kind: 2,
        title: title.to_string(),
        cover: format!("https://i0.hdslb.com/fav/{id}.jpg"),
        intro: format!("intro of {title}"),
        duration: 300,
        upper: Upper {
            mid: 2000 + id % 5,
            name: format!("upper {}", id % 5),
            face: String::new(),
        },
        cnt_info: CntInfo {
            collect: id,
            play: id * 100,
            danmaku: id * 3,
        },
        link: format!("bilibili://video/{id}"),
        ctime: 1_600_000_000 + id as i64,
        pubtime: 1_600_000_000 + id as i64,
        fav_time: 1_700_000_000 + id as i64,
        bv_id: format!("BV1{id:09}"),
        bvid: format!("BV1{id:09}"),
        folder_id: 0,
        index: 0,
    }
}

/// `count` resources with ids from `first_id`.
pub fn resources(first_id: u64, count: usize) -> Vec<FavoriteResource> {
    (0..count)
        .map(|i| {
            let id = first_id + i as u64;
            resource(id, &format!("favorite {id}"))
        })
        .collect()
}

/// Strategy for history categories, unknown values included.
pub fn business_strategy() -> impl Strategy<Value = Business> {
    prop_oneof![
        4 => Just(Business::Archive),
        1 => Just(Business::Pgc),
        1 => Just(Business::Live),
        1 => Just(Business::Article),
        1 => Just(Business::ArticleList),
        1 => Just(Business::Cheese),
        1 => "[a-z]{3,8}".prop_map(|s| Business::parse(&s)),
    ]
}

/// Strategy for a single history record.
pub fn history_record_strategy() -> impl Strategy<Value = HistoryRecord> {
    (
        1u64..1_000_000,
        business_strategy(),
        "[a-zA-Z0-9 ]{0,24}",
        "[a-zA-Z ]{0,12}",
        1_500_000_000i64..1_800_000_000,
    )
        .prop_map(|(id, business, title, author, view_at)| HistoryRecord {
            business,
            title,
            author_name: author,
            ..history(id, view_at)
        })
}

/// Strategy for a remote history timeline: up to `max_len` records with
/// distinct ids and distinct `view_at`, newest first.
pub fn history_timeline_strategy(max_len: usize) -> impl Strategy<Value = Vec<HistoryRecord>> {
    (
        prop::collection::btree_set(1u64..1_000_000, 0..=max_len),
        prop::collection::btree_set(1_500_000_000i64..1_800_000_000, max_len),
        prop::collection::vec(business_strategy(), max_len),
    )
        .prop_map(|(ids, times, businesses): (BTreeSet<u64>, BTreeSet<i64>, Vec<Business>)| {
            ids.into_iter()
                .zip(times.into_iter().rev())
                .zip(businesses)
                .map(|((id, view_at), business)| HistoryRecord {
                    business,
                    ..history(id, view_at)
                })
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_run_is_newest_first() {
        let run = history_run(10, 4, 1_000);
        let times: Vec<i64> = run.iter().map(|r| r.view_at).collect();
        assert_eq!(times, vec![1_000, 940, 880, 820]);
        assert_eq!(run[0].id, 10);
        assert_eq!(run[3].id, 13);
    }

    proptest! {
        #[test]
        fn timelines_are_strictly_descending(timeline in history_timeline_strategy(40)) {
            for pair in timeline.windows(2) {
                prop_assert!(pair[0].view_at > pair[1].view_at);
            }
            let ids: BTreeSet<u64> = timeline.iter().map(|r| r.id).collect();
            prop_assert_eq!(ids.len(), timeline.len());
        }
    }
}
