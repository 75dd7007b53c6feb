//! Append-only journal that makes the mirror survive restarts.
//!
//! ## Frame format
//!
//! ```text
//! | magic (4) | version (2) | kind (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The payload is the CBOR encoding of a [`JournalEntry`]. The CRC covers
//! header and payload.
//!
//! ## Recovery policy
//!
//! - A truncated header or payload at the tail is a crash mid-append: the
//!   partial frame is discarded and replay ends cleanly.
//! - A CRC mismatch, bad magic, unknown kind or newer version is corruption
//!   and opening fails.

use crate::backend::JournalBackend;
use crate::error::{StoreError, StoreResult};
use crate::schema::Row;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"GMPJ";

/// Current frame format version.
pub const JOURNAL_VERSION: u16 = 1;

const HEADER_SIZE: usize = 11;
const CRC_SIZE: usize = 4;

/// Kind byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// Rows written or replaced.
    Put = 1,
    /// Tables emptied.
    Clear = 2,
}

impl EntryKind {
    /// Converts a byte to a kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Clear),
            _ => None,
        }
    }
}

/// A single journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Rows bulk-put into a table, already carrying their primary keys.
    Put {
        /// Target table.
        table: String,
        /// Rows in write order.
        rows: Vec<Row>,
    },
    /// Tables cleared in one step.
    Clear {
        /// Cleared tables.
        tables: Vec<String>,
    },
}

impl JournalEntry {
    /// Returns the frame kind.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Put { .. } => EntryKind::Put,
            Self::Clear { .. } => EntryKind::Clear,
        }
    }

    /// Encodes the entry as a complete frame.
    pub fn encode_frame(&self) -> StoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload).map_err(|e| StoreError::codec(e.to_string()))?;

        let len = u32::try_from(payload.len()).map_err(|_| {
            StoreError::codec(format!("journal entry too large: {} bytes", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&JOURNAL_MAGIC);
        frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        frame.push(self.kind() as u8);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

/// Outcome of replaying a journal buffer.
#[derive(Debug, Default)]
pub struct Replay {
    /// Entries in append order.
    pub entries: Vec<JournalEntry>,
    /// Offset just past the last complete frame.
    pub valid_len: u64,
    /// Whether a partial frame was found at the tail.
    pub torn_tail: bool,
}

/// Decodes every complete frame in `bytes`.
pub fn replay(bytes: &[u8]) -> StoreResult<Replay> {
    let mut replay = Replay::default();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let offset = pos as u64;
        if bytes.len() - pos < HEADER_SIZE {
            replay.torn_tail = true;
            break;
        }

        let header = &bytes[pos..pos + HEADER_SIZE];
        if header[0..4] != JOURNAL_MAGIC {
            return Err(StoreError::journal_corruption(format!(
                "invalid magic at offset {offset}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            return Err(StoreError::journal_corruption(format!(
                "unsupported version {version} at offset {offset}"
            )));
        }

        let kind = EntryKind::from_byte(header[6]).ok_or_else(|| {
            StoreError::journal_corruption(format!(
                "unknown entry kind {} at offset {offset}",
                header[6]
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if bytes.len() - pos < total {
            replay.torn_tail = true;
            break;
        }

        let payload_end = pos + HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            bytes[payload_end],
            bytes[payload_end + 1],
            bytes[payload_end + 2],
            bytes[payload_end + 3],
        ]);
        let computed = compute_crc32(&bytes[pos..payload_end]);
        if stored != computed {
            return Err(StoreError::ChecksumMismatch {
                offset,
                expected: stored,
                actual: computed,
            });
        }

        let entry: JournalEntry = ciborium::from_reader(&bytes[pos + HEADER_SIZE..payload_end])
            .map_err(|e| {
                StoreError::journal_corruption(format!("undecodable entry at offset {offset}: {e}"))
            })?;
        if entry.kind() != kind {
            return Err(StoreError::journal_corruption(format!(
                "entry at offset {offset} does not match its kind byte"
            )));
        }

        replay.entries.push(entry);
        pos += total;
        replay.valid_len = pos as u64;
    }

    Ok(replay)
}

/// Journal writer over a backend.
pub struct Journal {
    backend: Box<dyn JournalBackend>,
    sync_on_commit: bool,
    /// Size right after the last recovery or rewrite.
    baseline: u64,
}

impl Journal {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn JournalBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
            baseline: 0,
        }
    }

    /// Replays the backend, cutting off a torn tail so later appends start clean.
    pub fn recover(&mut self) -> StoreResult<Vec<JournalEntry>> {
        let bytes = self.backend.read_all()?;
        let replay = replay(&bytes)?;
        if replay.torn_tail {
            tracing::warn!(
                valid_len = replay.valid_len,
                size = bytes.len(),
                "discarding partial journal frame"
            );
            self.backend.truncate(replay.valid_len)?;
            self.backend.sync()?;
        }
        self.baseline = replay.valid_len;
        Ok(replay.entries)
    }

    /// Appends one entry.
    pub fn append(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        let frame = entry.encode_frame()?;
        self.backend.append(&frame)?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Replaces the whole journal with `entries`.
    pub fn rewrite(&mut self, entries: &[JournalEntry]) -> StoreResult<()> {
        let mut bytes = Vec::new();
        for entry in entries {
            bytes.extend_from_slice(&entry.encode_frame()?);
        }
        self.backend.truncate(0)?;
        self.backend.append(&bytes)?;
        self.backend.sync()?;
        self.baseline = bytes.len() as u64;
        Ok(())
    }

    /// Whether the journal outgrew `threshold` and at least doubled since the
    /// last rewrite.
    pub fn needs_compaction(&self, threshold: u64) -> StoreResult<bool> {
        if threshold == 0 {
            return Ok(false);
        }
        let size = self.backend.size()?;
        Ok(size > threshold && size > self.baseline.saturating_mul(2))
    }

    /// Current journal size in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        self.backend.size()
    }
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn sample_put() -> JournalEntry {
        let row = match json!({"id": "r1", "user_id": "u1", "module": 1, "score_history": [1, 2]}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        JournalEntry::Put {
            table: "level_4".into(),
            rows: vec![row],
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_replay_in_order() {
        let clear = JournalEntry::Clear {
            tables: vec!["level_4".into()],
        };
        let mut bytes = sample_put().encode_frame().unwrap();
        bytes.extend(clear.encode_frame().unwrap());

        let replay = replay(&bytes).unwrap();
        assert_eq!(replay.entries, vec![sample_put(), clear]);
        assert_eq!(replay.valid_len, bytes.len() as u64);
        assert!(!replay.torn_tail);
    }

    #[test]
    fn torn_tail_is_tolerated() {
        let frame = sample_put().encode_frame().unwrap();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame[..frame.len() - 3]);

        let replay = replay(&bytes).unwrap();
        assert_eq!(replay.entries.len(), 1);
        assert_eq!(replay.valid_len, frame.len() as u64);
        assert!(replay.torn_tail);
    }

    #[test]
    fn flipped_bit_is_fatal() {
        let mut bytes = sample_put().encode_frame().unwrap();
        bytes[HEADER_SIZE + 2] ^= 0x01;
        assert!(matches!(
            replay(&bytes),
            Err(StoreError::ChecksumMismatch { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = sample_put().encode_frame().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            replay(&bytes),
            Err(StoreError::JournalCorruption { .. })
        ));
    }

    #[test]
    fn recover_cuts_torn_tail() {
        let frame = sample_put().encode_frame().unwrap();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&[b'G', b'M']);
        let backend = MemoryBackend::with_data(bytes);

        let mut journal = Journal::new(Box::new(backend.clone()), true);
        let entries = journal.recover().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(backend.data(), frame);
    }
}
