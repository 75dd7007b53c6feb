//! Sync descriptors for the mirrored tables.
//!
//! Pull and push are driven generically over a list of descriptors, so a
//! new collection is a new entry here rather than a new code path.

use gmpq_store::{
    Level1Session, Level2GameData, Level3Progress, Level4Progress, LevelProgress, Row,
    StoreResult, Syncable, DEFAULT_CONFLICT_KEYS,
};
use std::marker::PhantomData;

/// A table the engine pulls and pushes.
pub trait TableSync: Send + Sync {
    /// Table name, locally and remotely.
    fn table(&self) -> &'static str;

    /// Upsert conflict target.
    fn conflict_keys(&self) -> &'static [&'static str];

    /// Checks that a row decodes as this table's record type.
    fn validate(&self, row: &Row) -> StoreResult<()>;
}

/// Descriptor for a typed [`Syncable`] record.
pub struct SyncTable<T: Syncable> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Syncable> SyncTable<T> {
    /// Creates the descriptor.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Syncable> Default for SyncTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Syncable> TableSync for SyncTable<T> {
    fn table(&self) -> &'static str {
        T::TABLE
    }

    fn conflict_keys(&self) -> &'static [&'static str] {
        T::CONFLICT_KEYS
    }

    fn validate(&self, row: &Row) -> StoreResult<()> {
        T::from_row(row).map(|_| ())
    }
}

/// Descriptor for an untyped table matched on `id` only.
#[derive(Debug, Clone, Copy)]
pub struct DynamicTable {
    name: &'static str,
}

impl DynamicTable {
    /// Creates a descriptor for `name`.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl TableSync for DynamicTable {
    fn table(&self) -> &'static str {
        self.name
    }

    fn conflict_keys(&self) -> &'static [&'static str] {
        DEFAULT_CONFLICT_KEYS
    }

    fn validate(&self, _row: &Row) -> StoreResult<()> {
        Ok(())
    }
}

/// The five progress tables in their fixed visiting order.
pub fn gmp_quest_tables() -> Vec<Box<dyn TableSync>> {
    vec![
        Box::new(SyncTable::<LevelProgress>::new()),
        Box::new(SyncTable::<Level1Session>::new()),
        Box::new(SyncTable::<Level2GameData>::new()),
        Box::new(SyncTable::<Level3Progress>::new()),
        Box::new(SyncTable::<Level4Progress>::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmpq_store::StoreSchema;
    use serde_json::json;

    #[test]
    fn registry_matches_store_schema() {
        let schema = StoreSchema::gmp_quest();
        let tables = gmp_quest_tables();
        assert_eq!(tables.len(), schema.tables().len());
        for (table, declared) in tables.iter().zip(schema.tables()) {
            assert_eq!(table.table(), declared.name);
            assert_eq!(table.conflict_keys(), declared.compound_index);
        }
    }

    #[test]
    fn typed_validation() {
        let table = SyncTable::<Level4Progress>::new();
        let good = match json!({"user_id": "u1", "module": 1}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let bad = match json!({"user_id": "u1", "module": "one"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(table.validate(&good).is_ok());
        assert!(table.validate(&bad).is_err());
    }

    #[test]
    fn dynamic_table_falls_back_to_id() {
        let table = DynamicTable::new("badges");
        assert_eq!(table.conflict_keys(), ["id"]);
    }
}
