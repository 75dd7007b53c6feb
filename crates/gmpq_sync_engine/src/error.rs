//! Error types for the sync engine.

use crate::report::SyncReport;
use gmpq_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Cloneable so that per-table outcomes can carry the error that failed them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// No authenticated user could be resolved.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The remote refused access to a table (row-level security, missing grant).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The remote failed while handling the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// The remote rejected the request.
    #[error("remote rejected request ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Protocol error (unexpected response shape).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A row did not match the record type of its table.
    #[error("invalid row in {table}: {message}")]
    Decode {
        /// Table the row belongs to.
        table: String,
        /// Decoder message.
        message: String,
    },

    /// Local mirror store failure.
    #[error("local store error: {0}")]
    Store(String),

    /// Another pull, push or full sync is already running.
    #[error("a sync is already in progress")]
    SyncInProgress,

    /// The pull of a full sync completed but the push failed as a whole.
    #[error("push failed after pull: {error}")]
    PushFailed {
        /// Results of the completed pull.
        pull: Box<SyncReport>,
        /// Why the push failed.
        error: Box<SyncError>,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates the error returned when no user is signed in.
    pub fn not_authenticated() -> Self {
        Self::AuthenticationFailed("no authenticated user".into())
    }

    /// Creates a decode error for `table`.
    pub fn decode(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true if a later attempt may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) | SyncError::SyncInProgress => true,
            SyncError::PushFailed { error, .. } => error.is_retryable(),
            _ => false,
        }
    }

    /// Returns true for authentication and permission failures.
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::AuthenticationFailed(_) | SyncError::PermissionDenied(_) => true,
            SyncError::PushFailed { error, .. } => error.is_auth(),
            _ => false,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::ServerError("502".into()).is_retryable());
        assert!(!SyncError::PermissionDenied("rls".into()).is_retryable());
        assert!(!SyncError::not_authenticated().is_retryable());
    }

    #[test]
    fn auth_errors() {
        assert!(SyncError::not_authenticated().is_auth());
        assert!(SyncError::PermissionDenied("level_4".into()).is_auth());
        assert!(!SyncError::SyncInProgress.is_auth());
    }

    #[test]
    fn push_failure_keeps_pull_and_cause() {
        let err = SyncError::PushFailed {
            pull: Box::default(),
            error: Box::new(SyncError::not_authenticated()),
        };
        assert!(err.is_auth());
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("push failed after pull"));
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::unknown_table("badges").into();
        assert_eq!(err, SyncError::Store("unknown table: badges".into()));
    }

    #[test]
    fn error_display() {
        let err = SyncError::Remote {
            status: 409,
            message: "duplicate key".into(),
        };
        assert!(err.to_string().contains("409"));
        assert_eq!(
            SyncError::decode("level_4", "missing field `module`").to_string(),
            "invalid row in level_4: missing field `module`"
        );
    }
}
