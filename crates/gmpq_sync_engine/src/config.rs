//! Configuration for the sync engine.

use std::time::Duration;

/// Default quiet period before a debounced push fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Default window within which smart sync skips when nothing changed locally.
pub const DEFAULT_SMART_SYNC_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Smart sync skips a sync this soon after the last one when no local
    /// rows exist.
    pub smart_sync_window: Duration,
    /// Whether rows are checked against their record type before they are
    /// written locally or sent remotely.
    pub validate_rows: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            smart_sync_window: DEFAULT_SMART_SYNC_WINDOW,
            validate_rows: true,
        }
    }

    /// Sets the smart sync window.
    pub fn with_smart_sync_window(mut self, window: Duration) -> Self {
        self.smart_sync_window = window;
        self
    }

    /// Sets whether rows are validated.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_rows = validate;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for lifecycle-driven auto-sync.
#[derive(Debug, Clone)]
pub struct AutoSyncConfig {
    /// When false every trigger is a no-op.
    pub enabled: bool,
    /// Quiet period for debounced pushes.
    pub debounce: Duration,
    /// Push when the app becomes visible again.
    pub sync_on_visibility: bool,
}

impl AutoSyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
            sync_on_visibility: true,
        }
    }

    /// Enables or disables auto-sync.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets whether visibility changes push.
    pub fn with_sync_on_visibility(mut self, value: bool) -> Self {
        self.sync_on_visibility = value;
        self
    }
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection settings for the hosted REST backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project URL (e.g., "https://xyz.supabase.co").
    pub base_url: String,
    /// Public API key sent with every request.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Creates a remote configuration.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of a table endpoint.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    /// URL of the current-user endpoint.
    pub fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}
