//! Compact command implementation.

use super::stats::open_existing;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let before = store.journal_size()?;

    println!("Compacting journal at {:?}", path);
    println!("  Size before: {} bytes", before);
    if dry_run {
        println!("(dry run - no changes made)");
        return Ok(());
    }

    store.compact()?;
    let after = store.journal_size()?;
    println!("  Size after:  {} bytes", after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        before.saturating_sub(after),
        if before > 0 {
            (before.saturating_sub(after) as f64 / before as f64) * 100.0
        } else {
            0.0
        }
    );
    println!("✓ Compaction complete");
    Ok(())
}
