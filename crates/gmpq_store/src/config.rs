//! Store configuration.

/// Configuration for opening a mirror store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to sync the journal on every write (safer but slower).
    pub sync_on_commit: bool,

    /// Journal size in bytes above which writes trigger compaction (0 = never).
    pub compact_threshold: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            compact_threshold: 8 * 1024 * 1024, // 8 MB
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether every write is synced to durable storage.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the auto-compaction threshold.
    #[must_use]
    pub const fn compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_threshold = bytes;
        self
    }
}
