//! Status command implementation.

use super::{format_millis, open_service, CliResult, Credentials};
use bilisync_sync_engine::{KindSnapshot, SyncConfig};
use serde_json::json;
use std::path::Path;

/// Prints the sync state and store statistics.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let service = open_service(path, Credentials::default(), &SyncConfig::new())?;
    let sync = service.status()?;
    let stats = service.store().stats()?;

    if format == "json" {
        let value = json!({
            "sync": sync,
            "store": {
                "history": stats.history,
                "folders": stats.folders,
                "resources": stats.resources,
                "log_frames": stats.log_frames,
                "log_bytes": stats.log_bytes,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Store: {:?}", path);
    println!("  History records:    {}", stats.history);
    println!("  Favorite folders:   {}", stats.folders);
    println!("  Favorite resources: {}", stats.resources);
    println!("  Log: {} frames, {} bytes", stats.log_frames, stats.log_bytes);
    println!();
    print_kind("History sync", &sync.history);
    println!(
        "  Full sync done:  {}",
        if sync.has_completed_full_history_sync { "yes" } else { "no" }
    );
    println!();
    print_kind("Favorites sync", &sync.favorites);
    Ok(())
}

fn print_kind(title: &str, kind: &KindSnapshot) {
    println!("{title}:");
    println!("  Running:         {}", if kind.in_progress { "yes" } else { "no" });
    println!("  Interval:        {} ticks", kind.interval);
    println!("  Next run in:     {} ticks", kind.ticks_until_next_sync);
    println!(
        "  Last success:    {}",
        kind.last_sync.map_or_else(|| "never".to_string(), format_millis)
    );
}
