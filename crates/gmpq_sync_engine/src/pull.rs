//! Pull engine: remote rows for the current user into the mirror.

use crate::error::{SyncError, SyncResult};
use crate::report::{SyncReport, TableOutcome};
use crate::tables::TableSync;
use crate::transport::RemoteStore;
use gmpq_store::{MirrorStore, Row, StoreError, USER_ID};
use serde_json::Value;

/// Pulls every table in order.
///
/// Remote and decode failures are recorded per table and the next table is
/// tried. Local store failures abort with [`SyncError::Store`].
pub(crate) fn pull_tables(
    store: &MirrorStore,
    remote: &dyn RemoteStore,
    tables: &[Box<dyn TableSync>],
    user_id: &str,
    validate: bool,
) -> SyncResult<SyncReport> {
    let mut report = SyncReport::default();
    for table in tables {
        let outcome = pull_table(store, remote, table.as_ref(), user_id, validate)?;
        report.push(outcome);
    }
    Ok(report)
}

fn pull_table(
    store: &MirrorStore,
    remote: &dyn RemoteStore,
    table: &dyn TableSync,
    user_id: &str,
    validate: bool,
) -> SyncResult<TableOutcome> {
    let name = table.table();
    let local = match store.table(name) {
        Ok(local) => local,
        Err(StoreError::UnknownTable { .. }) => {
            return Ok(TableOutcome::failed(
                name,
                SyncError::Store(format!("table {name} is not mirrored locally")),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let rows = match remote.select_by_user(name, user_id) {
        Ok(rows) => rows,
        Err(e) => return Ok(TableOutcome::failed(name, e)),
    };

    let (rows, foreign): (Vec<Row>, Vec<Row>) =
        rows.into_iter().partition(|row| owned_by(row, user_id));
    if !foreign.is_empty() {
        tracing::warn!(
            table = name,
            dropped = foreign.len(),
            "remote returned rows of another user"
        );
    }

    if validate {
        if let Some(err) = rows.iter().find_map(|row| table.validate(row).err()) {
            return Ok(TableOutcome::failed(
                name,
                SyncError::decode(name, err.to_string()),
            ));
        }
    }

    let count = local.bulk_put(rows)?;
    tracing::debug!(table = name, count, "pulled");
    Ok(TableOutcome::ok(name, count))
}

fn owned_by(row: &Row, user_id: &str) -> bool {
    matches!(row.get(USER_ID), Some(Value::String(owner)) if owner == user_id)
}
