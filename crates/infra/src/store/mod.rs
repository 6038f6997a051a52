//! Storage contracts for user and group records.
//!
//! Both backends also implement [`usergroup_auth::CredentialStore`], the only
//! path through which the auth crate touches persisted credentials.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use usergroup_auth::DigestError;
use usergroup_auth::password;
use usergroup_core::{Group, GroupId, GroupUpdate, NewGroup, NewUser, StoreError, User, UserId, UserSummary, UserUpdate};

use crate::config::AdminAccount;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Display name given to the bootstrap administrator on first creation.
pub const BOOTSTRAP_ADMIN_NAME: &str = "Administrative Account";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Users ordered by id.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<UserSummary>, StoreError>;

    async fn get(&self, id: UserId) -> Result<User, StoreError>;

    async fn exists(&self, id: UserId) -> Result<bool, StoreError>;

    /// Highest id in use, 0 when there are no users.
    async fn max_id(&self) -> Result<i32, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// `new_user.password_hash` must already be a salted digest.
    async fn create(&self, new_user: &NewUser, creator: UserId) -> Result<User, StoreError>;

    /// Apply an administrative update. Also resets the bad-credential counter.
    async fn update(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError>;

    /// Self-service edit: writes only name, email, username, phone and comment.
    ///
    /// Flags, group membership, organisational links, inactivation data and
    /// the bad-credential counter keep their stored values.
    async fn update_profile(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError>;

    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Group>, StoreError>;

    async fn get(&self, id: GroupId) -> Result<Group, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn create(&self, new_group: &NewGroup, creator: UserId) -> Result<Group, StoreError>;

    async fn update(&self, id: GroupId, update: &GroupUpdate, actor: UserId) -> Result<Group, StoreError>;

    async fn delete(&self, id: GroupId) -> Result<(), StoreError>;
}

/// Salted digest stored for the bootstrap administrator.
///
/// Clients log in with the fast digest of the plaintext, so the stored value is
/// the salted digest of that fast digest.
pub fn admin_credential_digest(admin: &AdminAccount) -> Result<String, DigestError> {
    password::digest(&password::fast_digest(&admin.password))
}
