//! In-memory journal backend.

use super::JournalBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A journal backend that lives in memory.
///
/// Clones share the same buffer, so a test can keep one handle, hand the
/// other to a store, and later reopen a second store over the same bytes.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with journal bytes.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl JournalBackend for MemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StoreResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        let mut data = self.data.write();
        if new_size > data.len() as u64 {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to {} bytes, journal holds {}",
                    new_size,
                    data.len()
                ),
            )));
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_offsets() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn read_past_end_fails() {
        let mut backend = MemoryBackend::new();
        backend.append(b"hello").unwrap();
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StoreError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn clones_share_bytes() {
        let backend = MemoryBackend::new();
        let mut writer = backend.clone();
        writer.append(b"shared").unwrap();
        assert_eq!(backend.data(), b"shared");
    }

    #[test]
    fn truncate_only_shrinks() {
        let mut backend = MemoryBackend::with_data(b"hello world".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"hello");
        assert!(backend.truncate(100).is_err());
    }
}
