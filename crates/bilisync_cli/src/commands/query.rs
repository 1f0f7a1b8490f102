//! Query commands over the local store.

use super::{format_time, local_offset, open_store, CliResult};
use crate::FilterArgs;
use bilisync_core::{
    Business, DateRange, FavoriteResource, FavoritesFilter, HistoryFilter, HistoryRecord,
    KeywordFilter, QueryPage, SearchMode,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

impl FilterArgs {
    fn keyword(&self) -> CliResult<KeywordFilter> {
        let mode: SearchMode = self.mode.parse()?;
        Ok(KeywordFilter::new(mode, self.keyword.as_deref().unwrap_or_default()))
    }

    fn dates(&self) -> CliResult<DateRange> {
        Ok(DateRange::parse(self.start.as_deref(), self.end.as_deref())?.with_offset(local_offset()))
    }

    fn history_filter(&self, business: Option<&str>) -> CliResult<HistoryFilter> {
        Ok(HistoryFilter {
            keyword: self.keyword()?,
            business: business.map(business_filter).transpose()?.flatten(),
            dates: self.dates()?,
        })
    }

    fn favorites_filter(&self) -> CliResult<FavoritesFilter> {
        Ok(FavoritesFilter {
            keyword: self.keyword()?,
            dates: self.dates()?,
        })
    }
}

/// Parses a category filter; `all` means no filter.
fn business_filter(value: &str) -> CliResult<Option<Business>> {
    match Business::parse(value) {
        Business::Unknown(other) if other.is_empty() || other == "all" => Ok(None),
        Business::Unknown(other) => Err(format!("unknown history category: {other}").into()),
        business => Ok(Some(business)),
    }
}

/// Lists history records newest first.
pub fn history(
    path: &Path,
    filter: &FilterArgs,
    business: Option<&str>,
    after: Option<i64>,
    limit: usize,
    format: &str,
) -> CliResult<()> {
    let store = open_store(path)?;
    let page = store.query_history(after, limit, &filter.history_filter(business)?);

    if format == "json" {
        return print_json(&page);
    }
    for record in &page.items {
        println!("{}", history_line(record));
    }
    if page.has_more {
        if let Some(last) = page.items.last() {
            println!();
            println!("More results: --after {}", last.view_at);
        }
    }
    Ok(())
}

/// Lists favorites in folder order.
pub fn favorites(
    path: &Path,
    folder: Option<u64>,
    filter: &FilterArgs,
    after: Option<u64>,
    limit: usize,
    format: &str,
) -> CliResult<()> {
    let store = open_store(path)?;
    let page = store.query_favorites(folder, &filter.favorites_filter()?, after, limit);

    if format == "json" {
        return print_json(&page);
    }
    for resource in &page.items {
        println!("{}", favorite_line(resource));
    }
    if page.has_more {
        if let Some(last) = page.items.last() {
            println!();
            println!("More results: --after {}", last.id);
        }
    }
    Ok(())
}

/// Lists stored folders in remote order.
pub fn folders(path: &Path, mid: Option<u64>) -> CliResult<()> {
    let store = open_store(path)?;
    let folders = store.folders(mid);
    if folders.is_empty() {
        println!("No favorite folders stored. Run `bilisync sync favorites` first.");
        return Ok(());
    }
    println!("{:<12} {:>6} {:>8}  Title", "Id", "Stored", "Remote");
    for folder in folders {
        println!(
            "{:<12} {:>6} {:>8}  {}",
            folder.id,
            store.resource_count(Some(folder.id)),
            folder.media_count,
            folder.title
        );
    }
    Ok(())
}

/// Prints the number of history records, or of one folder's resources.
pub fn count(path: &Path, folder: Option<u64>) -> CliResult<()> {
    let store = open_store(path)?;
    match folder {
        Some(id) => println!("{}", store.resource_count(Some(id))),
        None => println!("{}", store.history_count()),
    }
    Ok(())
}

fn print_json<T: Serialize>(page: &QueryPage<T>) -> CliResult<()> {
    let value = json!({ "items": page.items, "has_more": page.has_more });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn history_line(record: &HistoryRecord) -> String {
    let author = if record.author_name.is_empty() {
        String::new()
    } else {
        format!(" - {}", record.author_name)
    };
    format!(
        "{}  [{}] {}{}  ({})",
        format_time(record.view_at),
        record.business,
        record.title,
        author,
        if record.bvid.is_empty() {
            record.id.to_string()
        } else {
            record.bvid.clone()
        }
    )
}

fn favorite_line(resource: &FavoriteResource) -> String {
    format!(
        "{:>4}. {} - {}  ({}, favorited {})",
        resource.index + 1,
        resource.title,
        resource.upper.name,
        resource.effective_bvid(),
        format_time(resource.favorited_at())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(keyword: Option<&str>, mode: &str) -> FilterArgs {
        FilterArgs {
            keyword: keyword.map(str::to_string),
            mode: mode.to_string(),
            start: None,
            end: None,
        }
    }

    #[test]
    fn filter_args_build_keyword_filters() {
        assert_eq!(args(None, "all").keyword().unwrap(), KeywordFilter::Any);
        assert_eq!(
            args(Some("Rust"), "title").keyword().unwrap(),
            KeywordFilter::Title("rust".to_string())
        );
        assert!(args(Some("x"), "everything").keyword().is_err());
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let mut filter = args(None, "all");
        filter.start = Some("2024-13-01".to_string());
        assert!(filter.favorites_filter().is_err());
    }

    #[test]
    fn business_filter_is_parsed() {
        let filter = args(None, "all").history_filter(Some("pgc")).unwrap();
        assert_eq!(filter.business, Some(Business::Pgc));
    }

    #[test]
    fn business_all_means_no_filter() {
        let filter = args(None, "all").history_filter(Some("all")).unwrap();
        assert_eq!(filter.business, None);
        assert!(args(None, "all").history_filter(Some("video")).is_err());
    }

    #[test]
    fn history_line_falls_back_to_id() {
        let record = HistoryRecord {
            id: 42,
            title: "Live show".to_string(),
            business: Business::Live,
            view_at: 0,
            ..Default::default()
        };
        let line = history_line(&record);
        assert!(line.contains("[live] Live show"));
        assert!(line.ends_with("(42)"));
    }
}
