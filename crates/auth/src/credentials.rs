//! Storage contract the authentication core depends on.
//!
//! The concrete persistence lives in `usergroup-infra`; this crate only sees
//! the trait, which keeps login and session checks testable with doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use usergroup_core::{StoreError, UserId};

/// Authentication-relevant projection of a user account.
///
/// `credential_digest` is always a salted digest produced by
/// [`crate::password::digest`], never raw input.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub id: UserId,
    pub login_name: String,
    pub display_name: String,
    pub email: String,
    pub credential_digest: String,
    pub is_admin: bool,
    pub is_locked: bool,
    pub is_active: bool,
    pub bad_credential_count: i32,
}

impl core::fmt::Debug for AuthRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthRecord")
            .field("id", &self.id)
            .field("login_name", &self.login_name)
            .field("credential_digest", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .field("is_locked", &self.is_locked)
            .field("is_active", &self.is_active)
            .field("bad_credential_count", &self.bad_credential_count)
            .finish()
    }
}

/// Live account flags read together by the session check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub is_active: bool,
    pub is_locked: bool,
}

/// Credential and account-state lookups used by login and session checks.
///
/// Every call is one round trip to the backing database and the only
/// suspension point on the authentication path.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve a login name (case-sensitive) to an account id.
    async fn find_id_by_login_name(&self, login_name: &str) -> Result<UserId, StoreError>;

    async fn load_auth_record(&self, id: UserId) -> Result<AuthRecord, StoreError>;

    async fn is_active(&self, id: UserId) -> Result<bool, StoreError>;

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError>;

    async fn is_locked(&self, id: UserId) -> Result<bool, StoreError>;

    /// `is_active` and `is_locked` in a single read.
    async fn account_state(&self, id: UserId) -> Result<AccountState, StoreError>;

    /// Replace the stored digest.
    ///
    /// In the same write the account is unlocked and its bad-credential
    /// counter returns to 0.
    async fn reset_password(
        &self,
        id: UserId,
        new_digest: &str,
        actor: UserId,
    ) -> Result<(), StoreError>;
}
