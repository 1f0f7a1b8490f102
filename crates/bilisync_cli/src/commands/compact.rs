//! Compact command implementation.

use super::{open_store, CliResult};
use std::path::Path;

/// Rewrites the record log of the store in `path`.
pub fn run(path: &Path) -> CliResult<()> {
    let store = open_store(path)?;
    let before = store.stats()?;
    println!("Compacting record log at {:?}", path);
    println!();

    let result = store.compact()?;
    let after = store.stats()?;

    println!("Compaction Results:");
    println!("  Input frames:      {}", result.input_records);
    println!("  Output frames:     {}", result.output_records);
    println!("  Tombstones:        {} removed", result.tombstones_removed);
    println!("  Obsolete versions: {} removed", result.obsolete_versions_removed);
    println!();
    println!("  Size before: {} bytes", before.log_bytes);
    println!("  Size after:  {} bytes", after.log_bytes);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        result.bytes_saved,
        if before.log_bytes > 0 {
            (result.bytes_saved as f64 / before.log_bytes as f64) * 100.0
        } else {
            0.0
        }
    );
    println!();
    println!("✓ Compaction complete");
    Ok(())
}
