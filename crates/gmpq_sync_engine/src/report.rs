//! Results of pull, push and full sync.

use crate::error::SyncError;

/// Outcome for one table within a pull or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    /// Table name.
    pub table: &'static str,
    /// Whether the table synced.
    pub success: bool,
    /// Rows written locally (pull) or sent remotely (push); zero on failure.
    pub count: usize,
    /// Why the table failed.
    pub error: Option<SyncError>,
}

impl TableOutcome {
    /// A successful table.
    pub fn ok(table: &'static str, count: usize) -> Self {
        Self {
            table,
            success: true,
            count,
            error: None,
        }
    }

    /// A failed table.
    pub fn failed(table: &'static str, error: SyncError) -> Self {
        Self {
            table,
            success: false,
            count: 0,
            error: Some(error),
        }
    }
}

/// Per-table results of a pull or push, in visiting order.
///
/// A report only exists once a user was resolved: the operation as a whole
/// succeeded even when individual tables failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outcomes in table order.
    pub results: Vec<TableOutcome>,
}

impl SyncReport {
    /// Outcome for `table`.
    pub fn get(&self, table: &str) -> Option<&TableOutcome> {
        self.results.iter().find(|r| r.table == table)
    }

    /// Whether every table succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// Names of the tables that failed.
    pub fn failed_tables(&self) -> Vec<&'static str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.table)
            .collect()
    }

    /// Rows moved across all tables.
    pub fn total_count(&self) -> usize {
        self.results.iter().map(|r| r.count).sum()
    }

    pub(crate) fn push(&mut self, outcome: TableOutcome) {
        self.results.push(outcome);
    }
}

/// Results of a pull followed by a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullSyncReport {
    /// Pull results.
    pub pull: SyncReport,
    /// Push results.
    pub push: SyncReport,
}

impl FullSyncReport {
    /// Whether every table succeeded in both directions.
    pub fn all_succeeded(&self) -> bool {
        self.pull.all_succeeded() && self.push.all_succeeded()
    }

    /// Tables that failed in either direction, without duplicates.
    pub fn failed_tables(&self) -> Vec<&'static str> {
        let mut failed = self.pull.failed_tables();
        for table in self.push.failed_tables() {
            if !failed.contains(&table) {
                failed.push(table);
            }
        }
        failed
    }
}

/// What smart sync decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartSyncOutcome {
    /// Nothing to push and the last sync is recent.
    Skipped,
    /// A full sync ran.
    Synced(FullSyncReport),
}

impl SmartSyncOutcome {
    /// Whether the sync was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_queries() {
        let mut report = SyncReport::default();
        report.push(TableOutcome::ok("level_1", 3));
        report.push(TableOutcome::failed(
            "level_4",
            SyncError::PermissionDenied("rls".into()),
        ));

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_tables(), ["level_4"]);
        assert_eq!(report.total_count(), 3);
        assert_eq!(report.get("level_4").unwrap().count, 0);
        assert!(report.get("level_2").is_none());
    }

    #[test]
    fn full_report_merges_failures() {
        let mut pull = SyncReport::default();
        pull.push(TableOutcome::failed("level_4", SyncError::SyncInProgress));
        let mut push = SyncReport::default();
        push.push(TableOutcome::failed("level_4", SyncError::SyncInProgress));
        push.push(TableOutcome::failed("level_1", SyncError::SyncInProgress));

        let full = FullSyncReport { pull, push };
        assert_eq!(full.failed_tables(), ["level_4", "level_1"]);
        assert!(!full.all_succeeded());
    }
}
