//! # GMP Quest testkit
//!
//! Test utilities for the mirror store and the sync engine.
//!
//! This crate provides:
//! - Store fixtures backed by memory or a temporary directory
//! - Row builders for the five progress collections
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gmpq_testkit::prelude::*;
//!
//! #[test]
//! fn counts_rows() {
//!     with_temp_store(|store| {
//!         store.table("level_4").unwrap().bulk_put(vec![level_4_row("u1", 1)]).unwrap();
//!         assert_eq!(store.database_stats()["level_4"], 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
