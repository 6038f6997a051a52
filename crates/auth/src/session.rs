//! Per-request session check.
//!
//! A token alone is not enough: the account behind it is re-read on every
//! request so that deactivating or locking a user takes effect before the
//! token expires.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use usergroup_core::StoreError;

use crate::claims::ClaimSet;
use crate::credentials::CredentialStore;
use crate::token::{TokenCodec, TokenError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("account has been deactivated")]
    AccountDeactivated,

    #[error("account has been locked")]
    AccountLocked,

    #[error("account no longer exists")]
    AccountGone,

    #[error("session check failed: {0}")]
    Internal(String),
}

impl SessionError {
    /// Faults on our side, as opposed to a request that must be rejected.
    pub fn is_internal(&self) -> bool {
        matches!(self, SessionError::Internal(_))
    }
}

#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    pub async fn check(&self, token: &str) -> Result<ClaimSet, SessionError> {
        self.check_at(token, Utc::now()).await
    }

    /// Verify the token, then confirm the account is still active and unlocked.
    #[instrument(skip_all)]
    pub async fn check_at(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, SessionError> {
        let claims = self.codec.verify_at(token, now)?;
        let id = claims.subject_id;

        let state = self.store.account_state(id).await.map_err(store_failure)?;
        if !state.is_active {
            tracing::info!(user_id = %id, "session rejected: account deactivated");
            return Err(SessionError::AccountDeactivated);
        }
        if state.is_locked {
            tracing::info!(user_id = %id, "session rejected: account locked");
            return Err(SessionError::AccountLocked);
        }

        tracing::debug!(user_id = %id, is_admin = claims.is_admin, "session accepted");
        Ok(claims)
    }
}

fn store_failure(e: StoreError) -> SessionError {
    match e {
        StoreError::NotFound(_) => SessionError::AccountGone,
        other => {
            tracing::error!(error = %other, "session status lookup failed");
            SessionError::Internal(other.to_string())
        }
    }
}
