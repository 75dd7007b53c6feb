//! CLI command implementations.

pub mod clear;
pub mod compact;
pub mod stats;
pub mod sync;
