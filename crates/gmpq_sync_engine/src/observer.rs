//! Sync result observers and the caller-visible status.

use crate::error::SyncError;
use crate::report::SyncReport;
use std::fmt;
use std::time::SystemTime;

/// Which engine produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Remote to local.
    Pull,
    /// Local to remote.
    Push,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => f.write_str("pull"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// Receives sync results so the host can notify users, retry or record
/// metrics.
///
/// Called on the thread that ran the sync; implementations should return
/// quickly.
pub trait SyncObserver: Send + Sync {
    /// A pull or push finished for the resolved user.
    fn on_report(&self, _kind: SyncKind, _report: &SyncReport) {}

    /// A pull or push failed as a whole.
    fn on_error(&self, _kind: SyncKind, _error: &SyncError) {}
}

/// Logs results with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_report(&self, kind: SyncKind, report: &SyncReport) {
        for outcome in &report.results {
            match &outcome.error {
                Some(error) => tracing::warn!(
                    %kind,
                    table = outcome.table,
                    %error,
                    "table sync failed"
                ),
                None => tracing::debug!(
                    %kind,
                    table = outcome.table,
                    count = outcome.count,
                    "table synced"
                ),
            }
        }
    }

    fn on_error(&self, kind: SyncKind, error: &SyncError) {
        tracing::warn!(%kind, %error, "sync failed");
    }
}

/// Running totals and the latest outcome, for a "last sync" indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Pulls started.
    pub pull_attempts: u64,
    /// Pushes started.
    pub push_attempts: u64,
    /// Full syncs that completed both directions.
    pub full_syncs: u64,
    /// Smart syncs that decided to skip.
    pub skipped_syncs: u64,
    /// When the last full sync completed.
    pub last_sync_time: Option<SystemTime>,
    /// Message of the last whole-operation failure, cleared by a success.
    pub last_error: Option<String>,
    /// Tables that failed in the last pull or push.
    pub failed_tables: Vec<String>,
}

impl SyncStatus {
    pub(crate) fn record_report(&mut self, report: &SyncReport) {
        self.last_error = None;
        self.failed_tables = report
            .failed_tables()
            .into_iter()
            .map(str::to_string)
            .collect();
    }

    pub(crate) fn record_error(&mut self, error: &SyncError) {
        self.last_error = Some(error.to_string());
    }
}
