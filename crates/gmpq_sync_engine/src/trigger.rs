//! Lifecycle-driven auto-sync.
//!
//! Maps connectivity, visibility, unload and data-change signals onto the
//! orchestrator's push. Data changes are debounced so a burst of writes
//! becomes one push at the end of the quiet period; the other signals push
//! immediately. Pushes, and the user lookup before them, run on the
//! blocking pool because the engine and its auth provider are synchronous.

use crate::config::AutoSyncConfig;
use crate::error::SyncError;
use crate::orchestrator::SyncOrchestrator;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A host lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Network connectivity came back.
    Online,
    /// Network connectivity was lost.
    Offline,
    /// The app became visible.
    Visible,
    /// The app was hidden.
    Hidden,
    /// The app is about to unload.
    BeforeUnload,
    /// Local progress was written.
    DataChanged,
}

/// Schedules pushes in response to lifecycle signals.
///
/// Holds at most one pending debounced push. Cloning shares the same slot.
#[derive(Clone)]
pub struct AutoSync {
    inner: Arc<Inner>,
}

struct Inner {
    orchestrator: Arc<SyncOrchestrator>,
    config: AutoSyncConfig,
    runtime: Handle,
    online: AtomicBool,
    generation: AtomicU64,
    pending: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl AutoSync {
    /// Creates the trigger layer; timers and pushes run on `runtime`.
    ///
    /// Starts in the online state.
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: AutoSyncConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                config,
                runtime,
                online: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    /// The orchestrator pushes go through.
    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.inner.orchestrator
    }

    /// Dispatches a lifecycle signal.
    ///
    /// Returns the handle of an immediate push, if one was started.
    pub fn handle(&self, event: LifecycleEvent) -> Option<JoinHandle<()>> {
        match event {
            LifecycleEvent::Online => self.connection_restored(),
            LifecycleEvent::Offline => {
                self.connection_lost();
                None
            }
            LifecycleEvent::Visible => self.visibility_changed(true),
            LifecycleEvent::Hidden => self.visibility_changed(false),
            LifecycleEvent::BeforeUnload => self.before_unload(),
            LifecycleEvent::DataChanged => self.trigger(false),
        }
    }

    /// Marks the connection up and pushes immediately.
    pub fn connection_restored(&self) -> Option<JoinHandle<()>> {
        self.inner.online.store(true, Ordering::SeqCst);
        tracing::debug!("connection restored");
        self.trigger(true)
    }

    /// Marks the connection down and drops any pending push.
    pub fn connection_lost(&self) {
        self.inner.online.store(false, Ordering::SeqCst);
        self.cancel_pending();
        tracing::debug!("connection lost");
    }

    /// Pushes immediately when the app becomes visible, if enabled.
    pub fn visibility_changed(&self, visible: bool) -> Option<JoinHandle<()>> {
        if visible && self.inner.config.sync_on_visibility {
            self.trigger(true)
        } else {
            None
        }
    }

    /// Starts a best-effort push; the host may exit before it completes.
    pub fn before_unload(&self) -> Option<JoinHandle<()>> {
        self.trigger(true)
    }

    /// Requests a push.
    ///
    /// Immediate requests start a push now. Otherwise any pending push is
    /// replaced by one that fires after the debounce window. Does nothing
    /// when disabled or offline. The signed-in user is resolved on the
    /// blocking pool when the push runs, and a push without a user is
    /// skipped there.
    pub fn trigger(&self, immediate: bool) -> Option<JoinHandle<()>> {
        if !self.inner.is_active() {
            return None;
        }
        if immediate {
            return Some(self.inner.spawn_push());
        }
        self.inner.schedule();
        None
    }

    /// Cancels the pending debounced push, if any.
    pub fn cancel_pending(&self) {
        if let Some((_, handle)) = self.inner.pending.lock().take() {
            handle.abort();
            tracing::debug!("pending push cancelled");
        }
    }

    /// Whether a debounced push is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Whether the connection is considered up.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn is_active(&self) -> bool {
        self.config.enabled && self.online.load(Ordering::SeqCst)
    }

    fn schedule(self: &Arc<Self>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(self);
        let delay = self.config.debounce;

        let mut pending = self.pending.lock();
        if let Some((_, previous)) = pending.take() {
            previous.abort();
        }
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = inner.pending.lock();
                if matches!(&*pending, Some((g, _)) if *g == generation) {
                    pending.take();
                }
            }
            if inner.is_active() {
                let push = inner.spawn_push();
                let _ = push.await;
            }
        });
        *pending = Some((generation, handle));
    }

    /// Pushes on the blocking pool. A push rejected because another sync
    /// holds the engine is re-armed with the debounce delay, since that
    /// sync may have read its rows before the change that triggered this one.
    fn spawn_push(self: &Arc<Self>) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            if inner.orchestrator.current_user().is_none() {
                tracing::debug!("auto push skipped, no user");
                return;
            }
            match inner.orchestrator.push() {
                Ok(report) => tracing::debug!(
                    pushed = report.total_count(),
                    failed = ?report.failed_tables(),
                    "auto push complete"
                ),
                Err(SyncError::SyncInProgress) => {
                    tracing::debug!("auto push deferred, sync in flight");
                    if inner.is_active() {
                        inner.schedule();
                    }
                }
                Err(error) => tracing::warn!(%error, "auto push failed"),
            }
        })
    }
}

impl std::fmt::Debug for AutoSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSync")
            .field("config", &self.inner.config)
            .field("online", &self.is_online())
            .field("pending", &self.has_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, AuthUser, StaticAuth};
    use crate::error::SyncResult;
    use crate::transport::MemoryRemote;
    use gmpq_store::MirrorStore;
    use std::thread::ThreadId;
    use std::time::Duration;

    fn auto_sync(auth: StaticAuth, config: AutoSyncConfig) -> AutoSync {
        let orchestrator = SyncOrchestrator::new(
            Arc::new(MirrorStore::open_in_memory().unwrap()),
            Arc::new(MemoryRemote::new()),
            Arc::new(auth),
        );
        AutoSync::new(Arc::new(orchestrator), config, Handle::current())
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_is_a_no_op() {
        let sync = auto_sync(
            StaticAuth::signed_in("u1"),
            AutoSyncConfig::new().with_enabled(false),
        );
        assert!(sync.trigger(true).is_none());
        sync.trigger(false);
        assert!(!sync.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_never_pushes() {
        let sync = auto_sync(StaticAuth::new(), AutoSyncConfig::new());
        sync.handle(LifecycleEvent::Online).unwrap().await.unwrap();
        sync.handle(LifecycleEvent::DataChanged);
        tokio::time::advance(Duration::from_secs(5)).await;

        let status = sync.orchestrator().status();
        assert_eq!(status.push_attempts, 0);
        assert!(status.last_error.is_none());
    }

    /// Records the thread of every user lookup.
    #[derive(Default)]
    struct ThreadRecordingAuth(Mutex<Vec<ThreadId>>);

    impl AuthProvider for ThreadRecordingAuth {
        fn current_user(&self) -> SyncResult<AuthUser> {
            self.0.lock().push(std::thread::current().id());
            Ok(AuthUser::new("u1"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn user_lookup_runs_off_the_async_thread() {
        let auth = Arc::new(ThreadRecordingAuth::default());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(MirrorStore::open_in_memory().unwrap()),
            Arc::new(MemoryRemote::new()),
            auth.clone(),
        );
        let sync = AutoSync::new(Arc::new(orchestrator), AutoSyncConfig::new(), Handle::current());
        let async_thread = std::thread::current().id();

        sync.trigger(true).unwrap().await.unwrap();
        sync.trigger(false);
        tokio::time::advance(Duration::from_secs(3)).await;
        while sync.orchestrator().status().push_attempts < 2 {
            tokio::task::yield_now().await;
        }

        let threads = auth.0.lock();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != async_thread));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_cancels_pending_and_blocks_triggers() {
        let sync = auto_sync(StaticAuth::signed_in("u1"), AutoSyncConfig::new());
        sync.trigger(false);
        assert!(sync.has_pending());

        sync.handle(LifecycleEvent::Offline);
        assert!(!sync.is_online());
        assert!(!sync.has_pending());

        sync.trigger(false);
        assert!(!sync.has_pending());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(sync.orchestrator().status().push_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_does_not_push() {
        let sync = auto_sync(StaticAuth::signed_in("u1"), AutoSyncConfig::new());
        assert!(sync.handle(LifecycleEvent::Hidden).is_none());

        let sync = auto_sync(
            StaticAuth::signed_in("u1"),
            AutoSyncConfig::new().with_sync_on_visibility(false),
        );
        assert!(sync.handle(LifecycleEvent::Visible).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn online_pushes_immediately() {
        let sync = auto_sync(StaticAuth::signed_in("u1"), AutoSyncConfig::new());
        sync.connection_lost();
        let push = sync.handle(LifecycleEvent::Online).unwrap();
        push.await.unwrap();
        assert!(sync.is_online());
        assert_eq!(sync.orchestrator().status().push_attempts, 1);
    }
}
