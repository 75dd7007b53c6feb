//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and rows for
//! the five progress collections.

use gmpq_store::{MirrorStore, Row};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store, shared the way the sync engine holds it.
    pub store: Arc<MirrorStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MirrorStore::open_in_memory().expect("Failed to open in-memory store")),
            temp_dir: None,
        }
    }

    /// Creates a new store journaled to a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = MirrorStore::open_path(temp_dir.path()).expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }

    /// Directory holding the journal, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the store and opens it again from its journal.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, which have nothing to reopen from.
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("Only file stores can be reopened");
        drop(self.store);
        let store = MirrorStore::open_path(temp_dir.path()).expect("Failed to reopen file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = MirrorStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&MirrorStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store)
}

/// Runs a test with a store journaled to a temporary directory.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&MirrorStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store, path)
}

/// Converts a JSON object literal into a row.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A `level_progress` row.
pub fn level_progress_row(user_id: &str, module_id: i64, level_id: i64, completed: bool) -> Row {
    row(json!({
        "user_id": user_id,
        "module_id": module_id,
        "level_id": level_id,
        "is_completed": completed,
    }))
}

/// A `level_1` session row.
pub fn level_1_row(user_id: &str, module_number: i64, level_number: i64, session_id: &str) -> Row {
    row(json!({
        "user_id": user_id,
        "module_number": module_number,
        "level_number": level_number,
        "session_id": session_id,
        "score": 0,
        "score_history": [],
        "timer_history": [],
    }))
}

/// A `level2_game_data` row.
pub fn level2_row(user_id: &str, module_id: i64, level_number: i64, score: i64) -> Row {
    row(json!({
        "user_id": user_id,
        "module_id": module_id,
        "level_number": level_number,
        "score": score,
        "score_history": [score],
    }))
}

/// A `level3_progress` row.
pub fn level3_row(user_id: &str, module: i64, level: i64, scenario_index: i64, score: i64) -> Row {
    row(json!({
        "user_id": user_id,
        "module": module,
        "level": level,
        "scenario_index": scenario_index,
        "current_score": score,
        "score_history": [score],
        "time_history": [30],
        "total_attempts": 1,
    }))
}

/// A `level_4` row.
pub fn level_4_row(user_id: &str, module: i64) -> Row {
    row(json!({
        "user_id": user_id,
        "module": module,
        "score": 0,
        "score_history": [],
        "time_history": [],
    }))
}

/// One row per progress collection for `user_id`, in schema order.
pub fn sample_rows(user_id: &str) -> Vec<(&'static str, Row)> {
    vec![
        ("level_progress", level_progress_row(user_id, 1, 1, true)),
        ("level_1", level_1_row(user_id, 1, 1, "s-1")),
        ("level2_game_data", level2_row(user_id, 1, 2, 40)),
        ("level3_progress", level3_row(user_id, 1, 3, 0, 70)),
        ("level_4", level_4_row(user_id, 1)),
    ]
}

/// Writes [`sample_rows`] into `store`.
pub fn seed_store(store: &MirrorStore, user_id: &str) {
    for (table, r) in sample_rows(user_id) {
        store
            .table(table)
            .expect("sample table is declared")
            .bulk_put(vec![r])
            .expect("Failed to seed store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_store_has_one_row_per_table() {
        with_temp_store(|store| {
            seed_store(store, "u1");
            assert!(store.database_stats().values().all(|&count| count == 1));
        });
    }

    #[test]
    fn file_store_reopens() {
        let test_store = TestStore::file();
        seed_store(&test_store, "u1");
        let reopened = test_store.reopen();
        assert_eq!(reopened.database_stats()["level3_progress"], 1);
    }
}
