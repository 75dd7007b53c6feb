//! Typed access to a mirrored collection.

use crate::error::StoreResult;
use crate::schema::{Syncable, USER_ID};
use crate::table::TableHandle;
use std::marker::PhantomData;

/// A typed view over one mirrored table.
///
/// `Collection<T>` decodes rows into `T` and encodes `T` back into rows,
/// so application code can read and record progress without touching raw
/// JSON maps.
///
/// # Example
///
/// ```rust,ignore
/// use gmpq_store::{Level4Progress, MirrorStore};
///
/// let store = MirrorStore::open_in_memory()?;
/// let level_4 = store.collection::<Level4Progress>()?;
///
/// let saved = level_4.put(&Level4Progress {
///     user_id: "u1".into(),
///     module: 1,
///     score: 80,
///     ..Default::default()
/// })?;
/// assert!(saved.id.is_some());
/// ```
pub struct Collection<'a, T: Syncable> {
    table: TableHandle<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T: Syncable> Collection<'a, T> {
    pub(crate) fn new(table: TableHandle<'a>) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    /// Underlying untyped handle.
    pub fn table(&self) -> TableHandle<'a> {
        self.table
    }

    /// Writes one record and returns it as stored, with its primary key.
    pub fn put(&self, record: &T) -> StoreResult<T> {
        let row = self.table.put(record.to_row()?)?;
        T::from_row(&row)
    }

    /// Writes records in one journal record.
    pub fn bulk_put(&self, records: &[T]) -> StoreResult<usize> {
        let rows = records
            .iter()
            .map(T::to_row)
            .collect::<StoreResult<Vec<_>>>()?;
        self.table.bulk_put(rows)
    }

    /// Records owned by `user_id`.
    pub fn for_user(&self, user_id: &str) -> StoreResult<Vec<T>> {
        self.table
            .where_field(USER_ID)
            .equals(user_id)?
            .iter()
            .map(T::from_row)
            .collect()
    }

    /// Every record in the table.
    pub fn all(&self) -> StoreResult<Vec<T>> {
        self.table.all()?.iter().map(T::from_row).collect()
    }

    /// Stored record with the same compound key as `record`.
    pub fn find(&self, record: &T) -> StoreResult<Option<T>> {
        self.table
            .get_by_key(&record.to_row()?)?
            .as_ref()
            .map(T::from_row)
            .transpose()
    }

    /// Number of records.
    pub fn count(&self) -> StoreResult<usize> {
        self.table.count()
    }
}

impl<T: Syncable> std::fmt::Debug for Collection<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("table", &self.table.name())
            .finish()
    }
}
