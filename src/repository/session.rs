//! Signed-in principal
//!
//! Authentication itself happens elsewhere; the session only records which
//! user the repositories act for.

use std::sync::{Arc, RwLock};

use super::{RepoError, RepoResult};

#[derive(Debug, Clone, Default)]
pub struct Session {
    user_id: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(user_id);
        session
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let mut guard = self.user_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        let mut guard = self.user_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user_id().is_some()
    }

    pub fn require_user(&self) -> RepoResult<String> {
        self.current_user_id().ok_or(RepoError::NotLoggedIn)
    }
}
