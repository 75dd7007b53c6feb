//! # GMP Quest Sync Engine
//!
//! Keeps the local mirror store and the hosted backend in step for the
//! signed-in user.
//!
//! This crate provides:
//! - Pull engine (remote rows for the current user into the mirror)
//! - Push engine (local rows upserted remotely on each table's conflict key)
//! - Sync orchestrator (full sync, local-change check, smart sync)
//! - Lifecycle-driven auto-sync with debounced pushes
//! - Remote and auth adapters for the hosted REST API
//!
//! ## Architecture
//!
//! A full sync is **pull-then-push**:
//! 1. Pull remote rows first, so changes made elsewhere land locally
//! 2. Push local rows, overwriting remote rows with the same conflict key
//!
//! ## Key Invariants
//!
//! - Only rows whose `user_id` is the signed-in user are read or written
//! - Tables are visited in a fixed order; one table's failure never aborts
//!   the others
//! - No user means no requests at all
//! - At most one pull, push or full sync runs at a time

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod http;
mod observer;
mod orchestrator;
mod pull;
mod push;
mod report;
mod tables;
mod transport;
mod trigger;

pub use auth::{AuthProvider, AuthUser, StaticAuth};
pub use config::{
    AutoSyncConfig, RemoteConfig, SyncConfig, DEFAULT_DEBOUNCE, DEFAULT_SMART_SYNC_WINDOW,
};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{
    status_error, HttpClient, HttpRequest, HttpResponse, Method, RestRemote, TokenAuth,
};
pub use observer::{SyncKind, SyncObserver, SyncStatus, TracingObserver};
pub use orchestrator::SyncOrchestrator;
pub use report::{FullSyncReport, SmartSyncOutcome, SyncReport, TableOutcome};
pub use tables::{gmp_quest_tables, DynamicTable, SyncTable, TableSync};
pub use transport::{MemoryRemote, RemoteStore, UpsertOptions};
pub use trigger::{AutoSync, LifecycleEvent};
