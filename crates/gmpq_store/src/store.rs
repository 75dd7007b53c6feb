//! The local mirror store.
//!
//! `MirrorStore` keeps every mirrored collection in memory and makes each
//! mutation durable by appending one journal frame before applying it.
//! Opening a store replays the journal; compaction rewrites it as a
//! snapshot of the current rows.

use crate::backend::{FileBackend, JournalBackend, MemoryBackend};
use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, JournalEntry};
use crate::schema::{Row, StoreSchema, Syncable};
use crate::table::{TableHandle, TableState};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the journal inside a store directory.
pub const JOURNAL_FILE: &str = "mirror.journal";

/// Row counts per collection, keyed by table name.
pub type TableCounts = BTreeMap<String, usize>;

/// Local, durable mirror of the remote progress collections.
///
/// All methods take `&self`; the store is shared behind an `Arc` by the sync
/// engine and the application.
pub struct MirrorStore {
    schema: StoreSchema,
    config: StoreConfig,
    tables: RwLock<BTreeMap<&'static str, TableState>>,
    journal: Mutex<Journal>,
}

impl MirrorStore {
    /// Opens a store over `backend`, replaying whatever it already holds.
    ///
    /// # Errors
    ///
    /// Fails if the journal is corrupted or the backend cannot be read.
    /// A partially written final frame is not an error: it is discarded.
    pub fn open(
        config: StoreConfig,
        schema: StoreSchema,
        backend: Box<dyn JournalBackend>,
    ) -> StoreResult<Self> {
        let mut journal = Journal::new(backend, config.sync_on_commit);
        let entries = journal.recover()?;

        let mut tables: BTreeMap<&'static str, TableState> = schema
            .tables()
            .iter()
            .map(|t| (t.name, TableState::new(*t)))
            .collect();

        let replayed = entries.len();
        for entry in entries {
            apply(&mut tables, entry);
        }
        tracing::debug!(entries = replayed, "mirror store opened");

        Ok(Self {
            schema,
            config,
            tables: RwLock::new(tables),
            journal: Mutex::new(journal),
        })
    }

    /// Opens an empty, non-persistent store with the GMP Quest schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(
            StoreConfig::default(),
            StoreSchema::gmp_quest(),
            Box::new(MemoryBackend::new()),
        )
    }

    /// Opens (or creates) a persistent store in directory `dir`.
    pub fn open_path(dir: &Path) -> StoreResult<Self> {
        Self::open_path_with_config(dir, StoreConfig::default())
    }

    /// Opens a persistent store in `dir` with custom configuration.
    pub fn open_path_with_config(dir: &Path, config: StoreConfig) -> StoreResult<Self> {
        let backend = FileBackend::open(&dir.join(JOURNAL_FILE))?;
        Self::open(config, StoreSchema::gmp_quest(), Box::new(backend))
    }

    /// Declared collections.
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns a handle to a declared table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] for names outside the schema.
    pub fn table(&self, name: &str) -> StoreResult<TableHandle<'_>> {
        let schema = self
            .schema
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::unknown_table(name))?;
        Ok(TableHandle::new(self, schema))
    }

    /// Returns a typed view over the table of `T`.
    pub fn collection<T: Syncable>(&self) -> StoreResult<Collection<'_, T>> {
        Ok(Collection::new(self.table(T::TABLE)?))
    }

    /// Empties every declared collection in one journal record.
    ///
    /// Used on sign-out; the remote side is untouched.
    pub fn clear_offline_data(&self) -> StoreResult<()> {
        let names: Vec<&'static str> = self.schema.tables().iter().map(|t| t.name).collect();
        self.commit_clear(names)?;
        tracing::info!("offline data cleared");
        Ok(())
    }

    /// Row count per declared collection.
    ///
    /// Diagnostic only: a table that cannot be read is reported with a
    /// count of zero and a warning instead of failing the whole call.
    pub fn database_stats(&self) -> TableCounts {
        let tables = self.tables.read();
        self.schema
            .tables()
            .iter()
            .map(|t| {
                let count = match tables.get(t.name) {
                    Some(state) => state.len(),
                    None => {
                        tracing::warn!(table = t.name, "table missing from mirror state");
                        0
                    }
                };
                (t.name.to_string(), count)
            })
            .collect()
    }

    /// Current journal size in bytes.
    pub fn journal_size(&self) -> StoreResult<u64> {
        self.journal.lock().size()
    }

    /// Rewrites the journal as one record per non-empty table.
    pub fn compact(&self) -> StoreResult<()> {
        let tables = self.tables.read();
        let mut journal = self.journal.lock();
        compact_locked(&tables, &mut journal)
    }

    pub(crate) fn read_table<R>(
        &self,
        name: &'static str,
        f: impl FnOnce(&TableState) -> R,
    ) -> StoreResult<R> {
        let tables = self.tables.read();
        let state = tables
            .get(name)
            .ok_or_else(|| StoreError::unknown_table(name))?;
        Ok(f(state))
    }

    pub(crate) fn commit_put(&self, table: &'static str, rows: Vec<Row>) -> StoreResult<()> {
        self.commit(JournalEntry::Put {
            table: table.to_string(),
            rows,
        })
    }

    pub(crate) fn commit_clear(&self, tables: Vec<&'static str>) -> StoreResult<()> {
        self.commit(JournalEntry::Clear {
            tables: tables.into_iter().map(str::to_string).collect(),
        })
    }

    fn commit(&self, entry: JournalEntry) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mut journal = self.journal.lock();

        journal.append(&entry)?;
        apply(&mut tables, entry);

        if journal.needs_compaction(self.config.compact_threshold)? {
            let before = journal.size()?;
            compact_locked(&tables, &mut journal)?;
            tracing::debug!(before, after = journal.size()?, "journal compacted");
        }
        Ok(())
    }
}

impl std::fmt::Debug for MirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorStore")
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn apply(tables: &mut BTreeMap<&'static str, TableState>, entry: JournalEntry) {
    match entry {
        JournalEntry::Put { table, rows } => match tables.get_mut(table.as_str()) {
            Some(state) => {
                for row in rows {
                    state.put(row);
                }
            }
            None => tracing::warn!(table = %table, "skipping rows for undeclared table"),
        },
        JournalEntry::Clear { tables: names } => {
            for name in names {
                match tables.get_mut(name.as_str()) {
                    Some(state) => state.clear(),
                    None => tracing::warn!(table = %name, "skipping clear of undeclared table"),
                }
            }
        }
    }
}

fn compact_locked(
    tables: &BTreeMap<&'static str, TableState>,
    journal: &mut Journal,
) -> StoreResult<()> {
    let entries: Vec<JournalEntry> = tables
        .iter()
        .filter(|(_, state)| state.len() > 0)
        .map(|(name, state)| JournalEntry::Put {
            table: (*name).to_string(),
            rows: state.rows().cloned().collect(),
        })
        .collect();
    journal.rewrite(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unknown_table_is_rejected() {
        let store = MirrorStore::open_in_memory().unwrap();
        assert!(matches!(
            store.table("badges"),
            Err(StoreError::UnknownTable { .. })
        ));
    }

    #[test]
    fn writes_survive_reopen_over_same_backend() {
        let backend = MemoryBackend::new();
        let open = |b: &MemoryBackend| {
            MirrorStore::open(
                StoreConfig::default(),
                StoreSchema::gmp_quest(),
                Box::new(b.clone()),
            )
            .unwrap()
        };

        {
            let store = open(&backend);
            let table = store.table("level_4").unwrap();
            table
                .bulk_put(vec![
                    row(json!({"id": 1, "user_id": "u1", "module": 1})),
                    row(json!({"id": 2, "user_id": "u1", "module": 2})),
                ])
                .unwrap();
        }

        let store = open(&backend);
        assert_eq!(store.table("level_4").unwrap().count().unwrap(), 2);
    }

    #[test]
    fn clear_offline_data_empties_all_tables() {
        let store = MirrorStore::open_in_memory().unwrap();
        for name in ["level_progress", "level_4"] {
            store
                .table(name)
                .unwrap()
                .bulk_put(vec![row(json!({"user_id": "u1"}))])
                .unwrap();
        }

        store.clear_offline_data().unwrap();

        assert!(store.database_stats().values().all(|&count| count == 0));
    }

    #[test]
    fn stats_list_every_table() {
        let store = MirrorStore::open_in_memory().unwrap();
        store
            .table("level_1")
            .unwrap()
            .bulk_put(vec![row(json!({"user_id": "u1", "session_id": "s"}))])
            .unwrap();

        let stats = store.database_stats();
        assert_eq!(stats.len(), 5);
        assert_eq!(stats["level_1"], 1);
        assert_eq!(stats["level3_progress"], 0);
    }

    #[test]
    fn compaction_shrinks_journal() {
        let backend = MemoryBackend::new();
        let config = StoreConfig::default().compact_threshold(0);
        let store = MirrorStore::open(config, StoreSchema::gmp_quest(), Box::new(backend.clone()))
            .unwrap();
        let table = store.table("level_4").unwrap();
        for score in 0..20 {
            table
                .bulk_put(vec![row(json!({"id": 1, "user_id": "u1", "module": 1, "score": score}))])
                .unwrap();
        }

        let before = store.journal_size().unwrap();
        store.compact().unwrap();
        assert!(store.journal_size().unwrap() < before);

        let reopened =
            MirrorStore::open(StoreConfig::default(), StoreSchema::gmp_quest(), Box::new(backend))
                .unwrap();
        let rows = reopened.table("level_4").unwrap().all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["score"], json!(19));
    }

    #[test]
    fn auto_compaction_runs_past_threshold() {
        let config = StoreConfig::default().compact_threshold(256);
        let store = MirrorStore::open(
            config,
            StoreSchema::gmp_quest(),
            Box::new(MemoryBackend::new()),
        )
        .unwrap();
        let table = store.table("level_4").unwrap();
        for score in 0..50 {
            table
                .bulk_put(vec![row(json!({"id": 1, "user_id": "u1", "module": 1, "score": score}))])
                .unwrap();
        }

        // One live row never needs more than a few hundred bytes after compaction.
        assert!(store.journal_size().unwrap() < 1024);
    }
}
