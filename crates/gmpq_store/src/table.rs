//! Per-table state and the handle callers query through.

use crate::error::{StoreError, StoreResult};
use crate::schema::{primary_key_string, Row, RowId, TableSchema, PRIMARY_KEY};
use crate::store::MirrorStore;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// In-memory contents of one collection.
///
/// Rows are keyed by primary key. The compound index maps each uniqueness
/// key to the primary key currently holding it, so two rows never share a
/// compound key.
#[derive(Debug)]
pub(crate) struct TableState {
    schema: TableSchema,
    rows: BTreeMap<String, Row>,
    by_key: HashMap<String, String>,
}

impl TableState {
    pub(crate) fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// Writes a row that already carries its primary key.
    pub(crate) fn put(&mut self, row: Row) {
        let pk = row
            .get(PRIMARY_KEY)
            .map(primary_key_string)
            .unwrap_or_default();
        let key = self.schema.compound_key(&row);

        if let Some(previous) = self.rows.get(&pk) {
            let previous_key = self.schema.compound_key(previous);
            if previous_key != key {
                self.by_key.remove(&previous_key);
            }
        }

        if let Some(holder) = self.by_key.get(&key) {
            if *holder != pk {
                self.rows.remove(holder);
            }
        }

        self.by_key.insert(key, pk.clone());
        self.rows.insert(pk, row);
    }

    pub(crate) fn clear(&mut self) {
        self.rows.clear();
        self.by_key.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub(crate) fn get(&self, pk: &str) -> Option<&Row> {
        self.rows.get(pk)
    }

    pub(crate) fn get_by_key(&self, key: &str) -> Option<&Row> {
        self.by_key.get(key).and_then(|pk| self.rows.get(pk))
    }
}

/// Fills in a primary key for rows created on this device and checks the
/// ones that already have one.
pub(crate) fn prepare_row(table: &str, mut row: Row) -> StoreResult<Row> {
    match row.get(PRIMARY_KEY) {
        None | Some(Value::Null) => {
            row.insert(PRIMARY_KEY.to_string(), RowId::generate().into());
        }
        Some(Value::String(_)) | Some(Value::Number(_)) => {}
        Some(other) => {
            return Err(StoreError::invalid_row(
                table,
                format!("primary key must be a string or number, got {other}"),
            ));
        }
    }
    Ok(row)
}

/// Handle to one mirrored collection.
///
/// Mirrors the small query surface the sync layer needs: bulk
/// write-or-replace, equality filter, count and clear.
#[derive(Debug, Clone, Copy)]
pub struct TableHandle<'a> {
    store: &'a MirrorStore,
    schema: TableSchema,
}

impl<'a> TableHandle<'a> {
    pub(crate) fn new(store: &'a MirrorStore, schema: TableSchema) -> Self {
        Self { store, schema }
    }

    /// Table name.
    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Table declaration.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Writes rows, replacing any existing row with the same primary key or
    /// the same compound key. Rows without an `id` get a fresh UUID.
    ///
    /// All rows land in one journal record.
    pub fn bulk_put(&self, rows: Vec<Row>) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let rows = rows
            .into_iter()
            .map(|row| prepare_row(self.schema.name, row))
            .collect::<StoreResult<Vec<_>>>()?;
        let count = rows.len();
        self.store.commit_put(self.schema.name, rows)?;
        Ok(count)
    }

    /// Writes a single row and returns it with its primary key.
    pub fn put(&self, row: Row) -> StoreResult<Row> {
        let row = prepare_row(self.schema.name, row)?;
        self.store.commit_put(self.schema.name, vec![row.clone()])?;
        Ok(row)
    }

    /// Starts an equality filter on `field`.
    pub fn where_field(&self, field: &'a str) -> WhereClause<'a> {
        WhereClause {
            table: *self,
            field,
        }
    }

    /// Number of rows.
    pub fn count(&self) -> StoreResult<usize> {
        self.store.read_table(self.schema.name, |t| t.len())
    }

    /// All rows in primary key order.
    pub fn all(&self) -> StoreResult<Vec<Row>> {
        self.store
            .read_table(self.schema.name, |t| t.rows().cloned().collect())
    }

    /// Row with the given primary key.
    pub fn get(&self, id: &Value) -> StoreResult<Option<Row>> {
        let pk = primary_key_string(id);
        self.store
            .read_table(self.schema.name, |t| t.get(&pk).cloned())
    }

    /// Stored row with the same compound key as `row`.
    pub fn get_by_key(&self, row: &Row) -> StoreResult<Option<Row>> {
        let key = self.schema.compound_key(row);
        self.store
            .read_table(self.schema.name, |t| t.get_by_key(&key).cloned())
    }

    /// Removes every row from this table.
    pub fn clear(&self) -> StoreResult<()> {
        self.store.commit_clear(vec![self.schema.name])
    }
}

/// Equality filter built by [`TableHandle::where_field`].
#[derive(Debug, Clone, Copy)]
pub struct WhereClause<'a> {
    table: TableHandle<'a>,
    field: &'a str,
}

impl WhereClause<'_> {
    /// Rows whose field equals `value`.
    pub fn equals(&self, value: impl Into<Value>) -> StoreResult<Vec<Row>> {
        let value = value.into();
        let field = self.field;
        self.table.store.read_table(self.table.schema.name, |t| {
            t.rows()
                .filter(|row| row.get(field) == Some(&value))
                .cloned()
                .collect()
        })
    }

    /// Number of rows whose field equals `value`.
    pub fn count_equal(&self, value: impl Into<Value>) -> StoreResult<usize> {
        let value = value.into();
        let field = self.field;
        self.table.store.read_table(self.table.schema.name, |t| {
            t.rows().filter(|row| row.get(field) == Some(&value)).count()
        })
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

    fn level_4() -> TableState {
        TableState::new(TableSchema::new("level_4", &["user_id", "module"]))
    }

    #[test]
    fn put_replaces_by_primary_key() {
        let mut table = level_4();
        table.put(row(json!({"id": 1, "user_id": "u1", "module": 1, "score": 5})));
        table.put(row(json!({"id": 1, "user_id": "u1", "module": 1, "score": 9})));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("1").unwrap()["score"], json!(9));
    }

    #[test]
    fn put_replaces_holder_of_compound_key() {
        let mut table = level_4();
        table.put(row(json!({"id": "local", "user_id": "u1", "module": 2, "score": 5})));
        table.put(row(json!({"id": 77, "user_id": "u1", "module": 2, "score": 6})));

        assert_eq!(table.len(), 1);
        assert!(table.get("local").is_none());
        assert_eq!(table.get("77").unwrap()["score"], json!(6));
    }

    #[test]
    fn rekeyed_row_frees_old_compound_key() {
        let mut table = level_4();
        table.put(row(json!({"id": 1, "user_id": "u1", "module": 1})));
        table.put(row(json!({"id": 1, "user_id": "u1", "module": 3})));
        table.put(row(json!({"id": 2, "user_id": "u1", "module": 1})));

        assert_eq!(table.len(), 2);
        assert!(table.get("1").is_some());
        assert!(table.get("2").is_some());
    }

    #[test]
    fn prepare_row_assigns_uuid() {
        let prepared = prepare_row("level_4", row(json!({"user_id": "u1"}))).unwrap();
        assert!(prepared["id"].as_str().is_some_and(|id| id.len() == 36));
        let id: RowId = serde_json::from_value(prepared["id"].clone()).unwrap();
        assert!(matches!(id, RowId::Text(_)));

        let err = prepare_row("level_4", row(json!({"id": [1], "user_id": "u1"}))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { .. }));
    }
}
