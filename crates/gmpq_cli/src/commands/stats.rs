//! Stats command implementation.

use gmpq_store::{MirrorStore, JOURNAL_FILE};
use serde::Serialize;
use std::path::Path;

/// Mirror statistics.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    /// Mirror directory.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Rows per table, in schema order.
    pub tables: Vec<TableStats>,
    /// Rows across all tables.
    pub total_rows: usize,
}

/// Row count of one table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of rows.
    pub rows: usize,
}

/// Runs the stats command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let result = collect(&store, path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Opens a mirror that must already exist.
pub fn open_existing(path: &Path) -> Result<MirrorStore, Box<dyn std::error::Error>> {
    if !path.join(JOURNAL_FILE).exists() {
        return Err(format!("No mirror found at {:?}", path).into());
    }
    Ok(MirrorStore::open_path(path)?)
}

fn collect(store: &MirrorStore, path: &Path) -> Result<StatsResult, Box<dyn std::error::Error>> {
    let counts = store.database_stats();
    let tables: Vec<TableStats> = store
        .schema()
        .tables()
        .iter()
        .map(|t| TableStats {
            name: t.name.to_string(),
            rows: counts.get(t.name).copied().unwrap_or(0),
        })
        .collect();

    Ok(StatsResult {
        path: path.display().to_string(),
        journal_size: store.journal_size()?,
        total_rows: tables.iter().map(|t| t.rows).sum(),
        tables,
    })
}

fn print_text_output(result: &StatsResult) {
    println!("Mirror: {}", result.path);
    println!("Journal: {} bytes", result.journal_size);
    println!();
    for table in &result.tables {
        println!("  {:<18} {:>8}", table.name, table.rows);
    }
    println!("  {:<18} {:>8}", "total", result.total_rows);
}
