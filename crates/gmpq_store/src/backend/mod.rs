//! Byte stores underneath the journal.
//!
//! Backends are opaque: they know nothing about journal frames or rows.
//! The store owns all interpretation of the bytes.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::StoreResult;

/// An append-only byte store holding the journal.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` makes all appended data durable
/// - `truncate` only shrinks; it is used for tail repair and compaction
pub trait JournalBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Makes appended data durable.
    fn sync(&mut self) -> StoreResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StoreResult<u64>;

    /// Shrinks the store to `new_size` bytes.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;

    /// Reads the whole store.
    fn read_all(&self) -> StoreResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}

impl std::fmt::Debug for dyn JournalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalBackend")
            .field("size", &self.size().ok())
            .finish()
    }
}
