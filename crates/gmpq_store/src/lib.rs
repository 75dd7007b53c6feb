//! # GMP Quest mirror store
//!
//! Local, durable mirror of the remote progress collections, so the game
//! keeps working offline.
//!
//! This crate provides:
//! - Table declarations with compound uniqueness keys ([`StoreSchema`])
//! - Typed records for the five progress collections
//! - An append-only journal with checksummed frames and tail repair
//! - [`MirrorStore`] with bulk write-or-replace, equality queries, counts and
//!   an atomic sign-out clear
//!
//! ## Example
//!
//! ```rust,ignore
//! use gmpq_store::MirrorStore;
//! use std::path::Path;
//!
//! let store = MirrorStore::open_path(Path::new("gmpq_data"))?;
//! let rows = store.table("level_4")?.where_field("user_id").equals("u1")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
mod collection;
mod config;
mod error;
pub mod journal;
mod records;
mod schema;
mod store;
mod table;

pub use backend::{FileBackend, JournalBackend, MemoryBackend};
pub use collection::Collection;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use records::{Level1Session, Level2GameData, Level3Progress, Level4Progress, LevelProgress};
pub use schema::{
    Row, RowId, StoreSchema, Syncable, TableSchema, DEFAULT_CONFLICT_KEYS, PRIMARY_KEY, USER_ID,
};
pub use store::{MirrorStore, TableCounts, JOURNAL_FILE};
pub use table::{TableHandle, WhereClause};
