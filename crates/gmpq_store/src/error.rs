//! Error types for the local mirror store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local mirror store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the journal backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Journal is corrupted or has an unreadable record.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected while replaying the journal.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the offending record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// CBOR or JSON conversion failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Table is not declared in the store schema.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// Name of the table.
        name: String,
    },

    /// A row was rejected before it reached the journal.
    #[error("invalid row for table {table}: {message}")]
    InvalidRow {
        /// Table the row was written to.
        table: String,
        /// Why the row was rejected.
        message: String,
    },

    /// Read past the end of the backend.
    #[error("read beyond end of journal: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current journal size.
        size: u64,
    },
}

impl StoreError {
    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an unknown table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable { name: name.into() }
    }

    /// Creates an invalid row error.
    pub fn invalid_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
