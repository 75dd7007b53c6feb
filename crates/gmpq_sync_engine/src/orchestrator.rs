//! Sync orchestrator: pull, push, full sync and smart sync.

use crate::auth::{AuthProvider, AuthUser};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{SyncKind, SyncObserver, SyncStatus};
use crate::pull::pull_tables;
use crate::push::push_tables;
use crate::report::{FullSyncReport, SmartSyncOutcome, SyncReport};
use crate::tables::{gmp_quest_tables, TableSync};
use crate::transport::RemoteStore;
use gmpq_store::{MirrorStore, USER_ID};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Composes the pull and push engines over an injected store, remote and
/// auth provider.
///
/// Only one pull, push or full sync runs at a time; a call made while
/// another is in flight fails with [`SyncError::SyncInProgress`].
pub struct SyncOrchestrator {
    store: Arc<MirrorStore>,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    tables: Vec<Box<dyn TableSync>>,
    config: SyncConfig,
    observers: RwLock<Vec<Arc<dyn SyncObserver>>>,
    status: RwLock<SyncStatus>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncOrchestrator {
    /// Creates an orchestrator over the five progress tables.
    pub fn new(
        store: Arc<MirrorStore>,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            store,
            remote,
            auth,
            tables: gmp_quest_tables(),
            config: SyncConfig::default(),
            observers: RwLock::new(Vec::new()),
            status: RwLock::new(SyncStatus::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the table registry.
    pub fn with_tables(mut self, tables: Vec<Box<dyn TableSync>>) -> Self {
        self.tables = tables;
        self
    }

    /// Registers an observer for every later pull and push.
    pub fn add_observer(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.write().push(observer);
    }

    /// The mirror store.
    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the running status.
    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Whether a pull, push or full sync is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The signed-in user, or `None` when nobody can be resolved.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user().ok()
    }

    /// Copies the current user's remote rows into the mirror.
    pub fn pull(&self) -> SyncResult<SyncReport> {
        let _guard = self.begin()?;
        self.pull_locked()
    }

    /// Upserts the current user's local rows to the remote.
    pub fn push(&self) -> SyncResult<SyncReport> {
        let _guard = self.begin()?;
        self.push_locked()
    }

    /// Pulls, then pushes. A pull that fails as a whole skips the push.
    ///
    /// A push that fails as a whole after a completed pull returns
    /// [`SyncError::PushFailed`] carrying the pull results.
    pub fn full_sync(&self) -> SyncResult<FullSyncReport> {
        let _guard = self.begin()?;
        let pull = self.pull_locked()?;
        let push = self.push_locked().map_err(|error| SyncError::PushFailed {
            pull: Box::new(pull.clone()),
            error: Box::new(error),
        })?;

        let report = FullSyncReport { pull, push };
        {
            let mut status = self.status.write();
            status.full_syncs += 1;
            status.last_sync_time = Some(SystemTime::now());
            status.failed_tables = report
                .failed_tables()
                .into_iter()
                .map(str::to_string)
                .collect();
        }
        tracing::info!(
            pulled = report.pull.total_count(),
            pushed = report.push.total_count(),
            failed = ?report.failed_tables(),
            "full sync complete"
        );
        Ok(report)
    }

    /// Whether any mirrored table holds a row of the current user.
    ///
    /// False when nobody is signed in. A local read error counts as a
    /// change so callers sync instead of silently skipping.
    pub fn has_local_changes(&self) -> bool {
        let Some(user) = self.current_user() else {
            return false;
        };

        for table in &self.tables {
            let count = self
                .store
                .table(table.table())
                .and_then(|t| t.where_field(USER_ID).count_equal(user.id.as_str()));
            match count {
                Ok(0) => {}
                Ok(_) => return true,
                Err(error) => {
                    tracing::warn!(table = table.table(), %error, "local change check failed");
                    return true;
                }
            }
        }
        false
    }

    /// Runs a full sync unless nothing changed locally and the last sync
    /// happened within the smart sync window.
    ///
    /// A missing `last_sync` counts as long ago.
    pub fn smart_sync(
        &self,
        force: bool,
        last_sync: Option<SystemTime>,
    ) -> SyncResult<SmartSyncOutcome> {
        if !force && !self.has_local_changes() && self.is_recent(last_sync) {
            self.status.write().skipped_syncs += 1;
            tracing::debug!("smart sync skipped");
            return Ok(SmartSyncOutcome::Skipped);
        }
        self.full_sync().map(SmartSyncOutcome::Synced)
    }

    fn is_recent(&self, last_sync: Option<SystemTime>) -> bool {
        match last_sync {
            None => false,
            Some(at) => {
                let elapsed = SystemTime::now()
                    .duration_since(at)
                    .unwrap_or(Duration::ZERO);
                elapsed < self.config.smart_sync_window
            }
        }
    }

    fn begin(&self) -> SyncResult<InFlight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        Ok(InFlight(&self.in_flight))
    }

    fn pull_locked(&self) -> SyncResult<SyncReport> {
        self.status.write().pull_attempts += 1;
        let result = self.auth.current_user().and_then(|user| {
            pull_tables(
                &self.store,
                self.remote.as_ref(),
                &self.tables,
                &user.id,
                self.config.validate_rows,
            )
        });
        self.finish(SyncKind::Pull, result)
    }

    fn push_locked(&self) -> SyncResult<SyncReport> {
        self.status.write().push_attempts += 1;
        let result = self.auth.current_user().and_then(|user| {
            push_tables(
                &self.store,
                self.remote.as_ref(),
                &self.tables,
                &user.id,
                self.config.validate_rows,
            )
        });
        self.finish(SyncKind::Push, result)
    }

    fn finish(&self, kind: SyncKind, result: SyncResult<SyncReport>) -> SyncResult<SyncReport> {
        match &result {
            Ok(report) => {
                self.status.write().record_report(report);
                for observer in self.observers.read().iter() {
                    observer.on_report(kind, report);
                }
            }
            Err(error) => {
                self.status.write().record_error(error);
                for observer in self.observers.read().iter() {
                    observer.on_error(kind, error);
                }
            }
        }
        result
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("tables", &self.tables.iter().map(|t| t.table()).collect::<Vec<_>>())
            .field("in_flight", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use crate::transport::MemoryRemote;
    use serde_json::json;

    fn orchestrator(auth: StaticAuth) -> (Arc<MemoryRemote>, SyncOrchestrator) {
        let store = Arc::new(MirrorStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        let orchestrator = SyncOrchestrator::new(store, remote.clone(), Arc::new(auth));
        (remote, orchestrator)
    }

    fn row(value: serde_json::Value) -> gmpq_store::Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn pull_without_user_fails_before_any_request() {
        let (remote, orchestrator) = orchestrator(StaticAuth::new());
        let err = orchestrator.pull().unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationFailed(_)));
        assert_eq!(remote.select_calls(), 0);
        assert!(orchestrator.status().last_error.is_some());
    }

    #[test]
    fn full_sync_skips_push_after_failed_pull() {
        let (remote, orchestrator) = orchestrator(StaticAuth::new());
        assert!(orchestrator.full_sync().is_err());
        assert_eq!(remote.upsert_calls(), 0);
        assert_eq!(orchestrator.status().push_attempts, 0);
    }

    /// Resolves the user for the first call only, as if signed out mid-sync.
    struct SignsOutAfterFirstCall(std::sync::atomic::AtomicBool);

    impl AuthProvider for SignsOutAfterFirstCall {
        fn current_user(&self) -> SyncResult<AuthUser> {
            if self.0.swap(true, Ordering::SeqCst) {
                Err(SyncError::not_authenticated())
            } else {
                Ok(AuthUser::new("u1"))
            }
        }
    }

    #[test]
    fn push_failure_after_pull_keeps_pull_report() {
        let store = Arc::new(MirrorStore::open_in_memory().unwrap());
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(
            "level_4",
            vec![row(json!({"id": 1, "user_id": "u1", "module": 1}))],
        );
        let orchestrator = SyncOrchestrator::new(
            store,
            remote.clone(),
            Arc::new(SignsOutAfterFirstCall(AtomicBool::new(false))),
        );

        let err = orchestrator.full_sync().unwrap_err();

        let SyncError::PushFailed { pull, error } = err else {
            panic!("expected a push failure, got {err:?}");
        };
        assert_eq!(pull.get("level_4").unwrap().count, 1);
        assert!(matches!(*error, SyncError::AuthenticationFailed(_)));
        assert_eq!(remote.upsert_calls(), 0);
        assert_eq!(orchestrator.status().full_syncs, 0);
        assert_eq!(orchestrator.store().database_stats()["level_4"], 1);
    }

    #[test]
    fn guard_rejects_reentry_and_releases() {
        let (_, orchestrator) = orchestrator(StaticAuth::signed_in("u1"));
        {
            let _held = orchestrator.begin().unwrap();
            assert!(orchestrator.is_syncing());
            assert_eq!(orchestrator.push().unwrap_err(), SyncError::SyncInProgress);
        }
        assert!(!orchestrator.is_syncing());
        assert!(orchestrator.push().is_ok());
    }

    #[test]
    fn local_changes_only_count_current_user() {
        let (_, orchestrator) = orchestrator(StaticAuth::signed_in("u1"));
        assert!(!orchestrator.has_local_changes());

        orchestrator
            .store()
            .table("level_4")
            .unwrap()
            .bulk_put(vec![row(json!({"user_id": "u2", "module": 1}))])
            .unwrap();
        assert!(!orchestrator.has_local_changes());

        orchestrator
            .store()
            .table("level_1")
            .unwrap()
            .bulk_put(vec![row(
                json!({"user_id": "u1", "module_number": 1, "level_number": 1, "session_id": "s"}),
            )])
            .unwrap();
        assert!(orchestrator.has_local_changes());
    }

    #[test]
    fn no_user_means_no_local_changes() {
        let (_, orchestrator) = orchestrator(StaticAuth::new());
        orchestrator
            .store()
            .table("level_4")
            .unwrap()
            .bulk_put(vec![row(json!({"user_id": "u1", "module": 1}))])
            .unwrap();
        assert!(!orchestrator.has_local_changes());
    }

    #[test]
    fn missing_last_sync_runs() {
        let (_, orchestrator) = orchestrator(StaticAuth::signed_in("u1"));
        let outcome = orchestrator.smart_sync(false, None).unwrap();
        assert!(!outcome.is_skipped());
    }
}
