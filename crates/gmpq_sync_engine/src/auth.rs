//! Authenticated-user access.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use serde::Deserialize;

/// The signed-in user, as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    /// User id; every mirrored row is scoped by it.
    pub id: String,
    /// Email, when the auth service reports one.
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    /// Creates a user with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Resolves the current session's user.
///
/// Implementations return [`SyncError::AuthenticationFailed`] when nobody is
/// signed in or the session cannot be verified.
pub trait AuthProvider: Send + Sync {
    /// Returns the signed-in user.
    fn current_user(&self) -> SyncResult<AuthUser>;
}

/// In-process session holder.
///
/// Used by applications that manage sign-in themselves, and by tests.
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: RwLock<Option<AuthUser>>,
}

impl StaticAuth {
    /// Creates a provider with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider with `user_id` signed in.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let auth = Self::new();
        auth.sign_in(AuthUser::new(user_id));
        auth
    }

    /// Replaces the signed-in user.
    pub fn sign_in(&self, user: AuthUser) {
        *self.user.write() = Some(user);
    }

    /// Signs out.
    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> SyncResult<AuthUser> {
        self.user
            .read()
            .clone()
            .ok_or_else(SyncError::not_authenticated)
    }
}
