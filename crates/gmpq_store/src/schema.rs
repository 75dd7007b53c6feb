//! Table declarations shared by the store and the sync engine.
//!
//! Every mirrored collection is described once: its name and the ordered
//! field tuple that identifies a progress record. The same tuple is the
//! local compound index and the remote upsert conflict target.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A mirrored record as stored locally and sent over the wire.
pub type Row = serde_json::Map<String, Value>;

/// Name of the primary key field in every collection.
pub const PRIMARY_KEY: &str = "id";

/// Name of the owner field in every collection.
pub const USER_ID: &str = "user_id";

/// Conflict target used when a table declares none.
pub const DEFAULT_CONFLICT_KEYS: &[&str] = &[PRIMARY_KEY];

/// Primary key of a row: remote tables use either serial or text ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    /// Integer (serial) key.
    Int(i64),
    /// Text (UUID) key.
    Text(String),
}

impl RowId {
    /// Creates a fresh text key for a row created on this device.
    pub fn generate() -> Self {
        Self::Text(uuid::Uuid::new_v4().to_string())
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        match id {
            RowId::Int(id) => Value::from(id),
            RowId::Text(id) => Value::String(id),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// A typed record that can be mirrored locally and synced remotely.
///
/// Implementors name their table and the composite key used both for the
/// local compound index and for remote upserts. Tables that do not declare
/// a key fall back to matching on `id` alone.
pub trait Syncable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Remote and local table name.
    const TABLE: &'static str;

    /// Ordered uniqueness key.
    const CONFLICT_KEYS: &'static [&'static str] = DEFAULT_CONFLICT_KEYS;

    /// Owner of the record.
    fn user_id(&self) -> &str;

    /// Table declaration for the store schema.
    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE, Self::CONFLICT_KEYS)
    }

    /// Converts the record into a row.
    fn to_row(&self) -> StoreResult<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            other => Err(StoreError::invalid_row(
                Self::TABLE,
                format!("record serialized to {other}, expected an object"),
            )),
        }
    }

    /// Decodes a row into the record type.
    fn from_row(row: &Row) -> StoreResult<Self> {
        serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| StoreError::invalid_row(Self::TABLE, e.to_string()))
    }
}

/// Declaration of one mirrored collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// Compound uniqueness key (also the remote conflict target).
    pub compound_index: &'static [&'static str],
}

impl TableSchema {
    /// Declares a table with an explicit compound key.
    pub const fn new(name: &'static str, compound_index: &'static [&'static str]) -> Self {
        Self {
            name,
            compound_index,
        }
    }

    /// Declares a table keyed on `id` only.
    pub const fn keyed_by_id(name: &'static str) -> Self {
        Self::new(name, DEFAULT_CONFLICT_KEYS)
    }

    /// Extracts the compound key of a row as a canonical string.
    ///
    /// Missing fields count as `null`, matching how the remote compares them.
    pub fn compound_key(&self, row: &Row) -> String {
        let parts: Vec<&Value> = self
            .compound_index
            .iter()
            .map(|field| row.get(*field).unwrap_or(&Value::Null))
            .collect();
        serde_json::to_string(&parts).unwrap_or_default()
    }
}

/// The ordered set of collections a store mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    tables: Vec<TableSchema>,
}

impl StoreSchema {
    /// Creates a schema from table declarations, in visiting order.
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// The five GMP Quest progress collections.
    pub fn gmp_quest() -> Self {
        use crate::records::{
            Level1Session, Level2GameData, Level3Progress, Level4Progress, LevelProgress,
        };

        Self::new(vec![
            LevelProgress::schema(),
            Level1Session::schema(),
            Level2GameData::schema(),
            Level3Progress::schema(),
            Level4Progress::schema(),
        ])
    }

    /// Tables in declared order.
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Conflict target for a table, falling back to `id` when undeclared.
    pub fn conflict_keys(&self, name: &str) -> &'static [&'static str] {
        self.get(name)
            .map(|t| t.compound_index)
            .unwrap_or(DEFAULT_CONFLICT_KEYS)
    }
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self::gmp_quest()
    }
}

/// Canonical string form of a primary key value.
pub(crate) fn primary_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn gmp_quest_schema_order() {
        let schema = StoreSchema::gmp_quest();
        let names: Vec<_> = schema.tables().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "level_progress",
                "level_1",
                "level2_game_data",
                "level3_progress",
                "level_4"
            ]
        );
    }

    #[test]
    fn conflict_keys_per_table() {
        let schema = StoreSchema::gmp_quest();
        assert_eq!(
            schema.conflict_keys("level3_progress"),
            ["user_id", "module", "level", "scenario_index"]
        );
        assert_eq!(
            schema.conflict_keys("level_1"),
            ["user_id", "module_number", "level_number", "session_id"]
        );
        assert_eq!(schema.conflict_keys("level_4"), ["user_id", "module"]);
    }

    #[test]
    fn undeclared_table_falls_back_to_id() {
        let schema = StoreSchema::gmp_quest();
        assert_eq!(schema.conflict_keys("badges"), ["id"]);
    }

    #[test]
    fn compound_key_treats_missing_as_null() {
        let table = TableSchema::new("level_4", &["user_id", "module"]);
        let a = row(json!({"user_id": "u1", "module": 2, "score": 10}));
        let b = row(json!({"user_id": "u1", "module": 2, "score": 99}));
        let c = row(json!({"user_id": "u1"}));

        assert_eq!(table.compound_key(&a), table.compound_key(&b));
        assert_eq!(table.compound_key(&c), r#"["u1",null]"#);
    }

    #[test]
    fn row_id_forms() {
        assert_eq!(primary_key_string(&json!(42)), "42");
        assert_eq!(primary_key_string(&json!("abc")), "abc");
        assert_eq!(RowId::Int(7).to_string(), "7");
        assert!(matches!(RowId::generate(), RowId::Text(_)));
    }
}
