//! Clear command implementation.

use super::stats::open_existing;
use std::path::Path;

/// Runs the clear command.
pub fn run(path: &Path, confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err("Refusing to clear local progress without --yes".into());
    }

    let store = open_existing(path)?;
    let before: usize = store.database_stats().values().sum();
    store.clear_offline_data()?;

    println!("✓ Cleared {} rows from {:?}", before, path);
    Ok(())
}
