//! Remote store abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use gmpq_store::{Row, PRIMARY_KEY, USER_ID};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// How an upsert treats rows that collide on the conflict key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Conflict target, in key order.
    pub on_conflict: &'static [&'static str],
    /// When true, colliding rows are left alone instead of overwritten.
    pub ignore_duplicates: bool,
}

impl UpsertOptions {
    /// Overwrite rows that collide on `keys`.
    pub fn overwrite(keys: &'static [&'static str]) -> Self {
        Self {
            on_conflict: keys,
            ignore_duplicates: false,
        }
    }

    /// Conflict target as a comma-separated column list.
    pub fn on_conflict_param(&self) -> String {
        self.on_conflict.join(",")
    }
}

/// The hosted relational store the mirror syncs against.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (REST, in-process for testing, etc.).
pub trait RemoteStore: Send + Sync {
    /// Returns every row of `table` whose `user_id` equals `user_id`.
    fn select_by_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<Row>>;

    /// Inserts rows, resolving collisions on the conflict key per `options`.
    ///
    /// Returns the number of rows sent.
    fn upsert(&self, table: &str, rows: &[Row], options: &UpsertOptions) -> SyncResult<usize>;
}

/// An in-process remote store.
///
/// Implements overwrite-by-conflict-key upserts and lets tests inject
/// per-table failures and observe call counts.
#[derive(Debug)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failures: RwLock<HashMap<String, SyncError>>,
    delay: RwLock<Option<Duration>>,
    next_id: AtomicI64,
    select_calls: AtomicU64,
    upsert_calls: AtomicU64,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            delay: RwLock::new(None),
            next_id: AtomicI64::new(1),
            select_calls: AtomicU64::new(0),
            upsert_calls: AtomicU64::new(0),
        }
    }

    /// Stores rows as if another device had written them, assigning serial
    /// ids where missing.
    pub fn insert(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.tables.write();
        let stored = tables.entry(table.to_string()).or_default();
        for row in rows {
            stored.push(self.with_id(row));
        }
    }

    /// Every row of `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Rows of `table` owned by `user_id`.
    pub fn rows_for(&self, table: &str, user_id: &str) -> Vec<Row> {
        self.rows(table)
            .into_iter()
            .filter(|row| owned_by(row, user_id))
            .collect()
    }

    /// Makes every call touching `table` fail with `error`.
    pub fn fail_table(&self, table: &str, error: SyncError) {
        self.failures.write().insert(table.to_string(), error);
    }

    /// Removes an injected failure.
    pub fn heal_table(&self, table: &str) {
        self.failures.write().remove(table);
    }

    /// Makes every call sleep first, to simulate a slow network.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of select calls served.
    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of upsert calls served.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn with_id(&self, mut row: Row) -> Row {
        if matches!(row.get(PRIMARY_KEY), None | Some(Value::Null)) {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            row.insert(PRIMARY_KEY.to_string(), Value::from(id));
        }
        row
    }

    fn before_call(&self, table: &str) -> SyncResult<()> {
        if let Some(delay) = *self.delay.read() {
            std::thread::sleep(delay);
        }
        match self.failures.read().get(table) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn select_by_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<Row>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call(table)?;
        Ok(self.rows_for(table, user_id))
    }

    fn upsert(&self, table: &str, rows: &[Row], options: &UpsertOptions) -> SyncResult<usize> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call(table)?;

        let mut tables = self.tables.write();
        let stored = tables.entry(table.to_string()).or_default();
        for row in rows {
            let key = conflict_key(row, options.on_conflict);
            let existing = stored
                .iter()
                .position(|r| conflict_key(r, options.on_conflict) == key);

            match existing {
                Some(_) if options.ignore_duplicates => {}
                Some(index) => {
                    // Full-row overwrite; the remote keeps its id unless one is sent.
                    let mut replacement = row.clone();
                    if !replacement.contains_key(PRIMARY_KEY) {
                        if let Some(id) = stored[index].get(PRIMARY_KEY) {
                            replacement.insert(PRIMARY_KEY.to_string(), id.clone());
                        }
                    }
                    stored[index] = replacement;
                }
                None => stored.push(self.with_id(row.clone())),
            }
        }
        Ok(rows.len())
    }
}

fn conflict_key<'a>(row: &'a Row, keys: &[&str]) -> Vec<Option<&'a Value>> {
    keys.iter().map(|k| row.get(*k)).collect()
}

fn owned_by(row: &Row, user_id: &str) -> bool {
    row.get(USER_ID).and_then(Value::as_str) == Some(user_id)
}
