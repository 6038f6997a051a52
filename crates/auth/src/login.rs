//! Login: credential check and token issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use usergroup_core::StoreError;

use crate::claims::ClaimSet;
use crate::credentials::CredentialStore;
use crate::password;
use crate::token::TokenCodec;

/// Why a login was denied.
///
/// The variants exist for logs and tests. The HTTP layer collapses all of them
/// except `InternalFailure` into one indistinguishable 401.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("login name not found")]
    UsernameNotFound,

    #[error("account is not active")]
    AccountInactive,

    #[error("account is locked")]
    AccountLocked,

    #[error("wrong credential")]
    WrongCredential,

    #[error("internal failure: {0}")]
    InternalFailure(String),
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: ClaimSet,
}

/// Verifies submitted credentials and mints a bearer token.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    validity: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>, validity: Duration) -> Self {
        Self {
            store,
            codec,
            validity,
        }
    }

    pub async fn login(
        &self,
        login_name: &str,
        candidate_digest: &str,
    ) -> Result<IssuedToken, LoginError> {
        self.login_at(login_name, candidate_digest, Utc::now()).await
    }

    /// Run the login checks in order; the first failing check decides.
    ///
    /// 1. login name resolves to an id
    /// 2. the auth record loads
    /// 3. the account is active
    /// 4. the account is not locked
    /// 5. the candidate verifies against the stored digest
    ///
    /// A successful login writes nothing back to the store.
    #[instrument(skip(self, candidate_digest, now), fields(login_name = %login_name))]
    pub async fn login_at(
        &self,
        login_name: &str,
        candidate_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, LoginError> {
        let id = match self.store.find_id_by_login_name(login_name).await {
            Ok(id) => id,
            Err(StoreError::NotFound(_)) => {
                tracing::info!("login name was not found");
                return Err(LoginError::UsernameNotFound);
            }
            Err(e) => {
                tracing::error!(error = %e, "login name lookup failed");
                return Err(LoginError::InternalFailure(e.to_string()));
            }
        };

        let record = self.store.load_auth_record(id).await.map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "auth record could not be loaded");
            LoginError::InternalFailure(e.to_string())
        })?;

        if !record.is_active {
            tracing::info!(user_id = %id, "login refused: account is not active");
            return Err(LoginError::AccountInactive);
        }
        if record.is_locked {
            tracing::info!(user_id = %id, "login refused: account is locked");
            return Err(LoginError::AccountLocked);
        }
        if !password::verify(&record.credential_digest, candidate_digest) {
            // TODO: increment bad_credential_count here once a lockout threshold is agreed on.
            tracing::info!(user_id = %id, "login refused: wrong credential");
            return Err(LoginError::WrongCredential);
        }

        let claims = ClaimSet::issue(&record, now, self.validity);
        let token = self.codec.mint(&claims).map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "token could not be minted");
            LoginError::InternalFailure(e.to_string())
        })?;

        tracing::info!(user_id = %id, expires_at = %claims.expires_at, "login succeeded");
        Ok(IssuedToken { token, claims })
    }
}
