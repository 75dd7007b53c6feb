//! Push engine: local rows for the current user up to the remote.

use crate::error::{SyncError, SyncResult};
use crate::report::{SyncReport, TableOutcome};
use crate::tables::TableSync;
use crate::transport::{RemoteStore, UpsertOptions};
use gmpq_store::{MirrorStore, StoreError, USER_ID};

/// Pushes every table in order.
///
/// Failures are isolated the same way as for pull: remote and decode errors
/// are per table, local store errors abort.
pub(crate) fn push_tables(
    store: &MirrorStore,
    remote: &dyn RemoteStore,
    tables: &[Box<dyn TableSync>],
    user_id: &str,
    validate: bool,
) -> SyncResult<SyncReport> {
    let mut report = SyncReport::default();
    for table in tables {
        let outcome = push_table(store, remote, table.as_ref(), user_id, validate)?;
        report.push(outcome);
    }
    Ok(report)
}

fn push_table(
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

    let rows = local.where_field(USER_ID).equals(user_id)?;
    if rows.is_empty() {
        tracing::debug!(table = name, "nothing to push");
        return Ok(TableOutcome::ok(name, 0));
    }

    if validate {
        if let Some(err) = rows.iter().find_map(|row| table.validate(row).err()) {
            return Ok(TableOutcome::failed(
                name,
                SyncError::decode(name, err.to_string()),
            ));
        }
    }

    let options = UpsertOptions::overwrite(table.conflict_keys());
    match remote.upsert(name, &rows, &options) {
        Ok(count) => {
            tracing::debug!(table = name, count, "pushed");
            Ok(TableOutcome::ok(name, count))
        }
        Err(e) => Ok(TableOutcome::failed(name, e)),
    }
}
