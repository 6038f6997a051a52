//! Postgres-backed user and group store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | PoolClosed, network, decoding | N/A | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use usergroup_auth::{AccountState, AuthRecord, CredentialStore};
use usergroup_core::{
    Group, GroupId, GroupUpdate, NewGroup, NewUser, StoreError, User, UserId, UserSummary,
    UserUpdate,
};

use super::{GroupStore, UserStore};

/// User and group store over a Postgres pool.
///
/// The pool is owned here and shared by cloning the store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool and check the server answers.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&pool)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!(%version, "connected to postgres");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<UserSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, username, creator, create_time, is_admin, is_locked, is_active
            FROM go_user
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter()
            .map(|row| {
                UserSummaryRow::from_row(row)
                    .map(Into::into)
                    .map_err(|e| map_sqlx_error("list_users", e))
            })
            .collect()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, username, password_hash, external_id, orgunit_id, groups_id,
                   phone, is_locked, is_admin, create_time, creator, last_modification_time,
                   last_modification_user, is_active, inactivation_time, inactivation_reason,
                   comment, bad_password_count
            FROM go_user
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?
        .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;

        let user = UserRow::from_row(&row).map_err(|e| map_sqlx_error("get_user", e))?;
        Ok(user.into())
    }

    async fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM go_user WHERE id = $1")
            .bind(id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_exists", e))?;
        Ok(count > 0)
    }

    async fn max_id(&self) -> Result<i32, StoreError> {
        let max: Option<i32> = sqlx::query_scalar("SELECT MAX(id) FROM go_user")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("max_user_id", e))?;
        Ok(max.unwrap_or(0))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM go_user")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username, creator = %creator), err)]
    async fn create(&self, new_user: &NewUser, creator: UserId) -> Result<User, StoreError> {
        let groups: Vec<i32> = new_user.groups_id.iter().map(|g| g.get()).collect();
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO go_user
                (name, email, username, password_hash, external_id, orgunit_id, groups_id, phone,
                 is_locked, is_admin, create_time, creator, is_active, comment, bad_password_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, $9, now(), $10, true, $11, 0)
            RETURNING id
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(new_user.external_id)
        .bind(new_user.orgunit_id)
        .bind(&groups)
        .bind(&new_user.phone)
        .bind(new_user.is_admin)
        .bind(creator.get())
        .bind(&new_user.comment)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        UserStore::get(self, UserId::new(id)).await
    }

    #[instrument(skip(self, update), fields(user_id = %id, actor = %actor), err)]
    async fn update(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError> {
        let groups: Vec<i32> = update.groups_id.iter().map(|g| g.get()).collect();
        let result = sqlx::query(
            r#"
            UPDATE go_user
            SET name                   = $1,
                email                  = $2,
                username               = $3,
                external_id            = $4,
                orgunit_id             = $5,
                groups_id              = $6,
                phone                  = $7,
                is_locked              = $8,
                is_admin               = $9,
                last_modification_time = now(),
                last_modification_user = $10,
                inactivation_time      = CASE WHEN $11 THEN NULL ELSE COALESCE(inactivation_time, now()) END,
                is_active              = $11,
                inactivation_reason    = $12,
                comment                = $13,
                bad_password_count     = 0
            WHERE id = $14
            "#,
        )
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.username)
        .bind(update.external_id)
        .bind(update.orgunit_id)
        .bind(&groups)
        .bind(&update.phone)
        .bind(update.is_locked)
        .bind(update.is_admin)
        .bind(actor.get())
        .bind(update.is_active)
        .bind(&update.inactivation_reason)
        .bind(&update.comment)
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        UserStore::get(self, id).await
    }

    #[instrument(skip(self, update), fields(user_id = %id, actor = %actor), err)]
    async fn update_profile(&self, id: UserId, update: &UserUpdate, actor: UserId) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE go_user
            SET name                   = $1,
                email                  = $2,
                username               = $3,
                phone                  = $4,
                comment                = $5,
                last_modification_time = now(),
                last_modification_user = $6
            WHERE id = $7
            "#,
        )
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.username)
        .bind(&update.phone)
        .bind(&update.comment)
        .bind(actor.get())
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user_profile", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        UserStore::get(self, id).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM go_user WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, create_time, creator, last_modification_time, last_modification_user,
                   is_active, inactivation_time, inactivation_reason, comment
            FROM go_group
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_groups", e))?;

        rows.iter()
            .map(|row| {
                GroupRow::from_row(row)
                    .map(Into::into)
                    .map_err(|e| map_sqlx_error("list_groups", e))
            })
            .collect()
    }

    #[instrument(skip(self), fields(group_id = %id), err)]
    async fn get(&self, id: GroupId) -> Result<Group, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, create_time, creator, last_modification_time, last_modification_user,
                   is_active, inactivation_time, inactivation_reason, comment
            FROM go_group
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_group", e))?
        .ok_or_else(|| StoreError::not_found(format!("group {id}")))?;

        let group = GroupRow::from_row(&row).map_err(|e| map_sqlx_error("get_group", e))?;
        Ok(group.into())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM go_group")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_groups", e))
    }

    #[instrument(skip(self, new_group), fields(name = %new_group.name, creator = %creator), err)]
    async fn create(&self, new_group: &NewGroup, creator: UserId) -> Result<Group, StoreError> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO go_group (name, create_time, creator, is_active, comment)
            VALUES ($1, now(), $2, true, $3)
            RETURNING id
            "#,
        )
        .bind(&new_group.name)
        .bind(creator.get())
        .bind(&new_group.comment)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_group", e))?;

        GroupStore::get(self, GroupId::new(id)).await
    }

    #[instrument(skip(self, update), fields(group_id = %id, actor = %actor), err)]
    async fn update(&self, id: GroupId, update: &GroupUpdate, actor: UserId) -> Result<Group, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE go_group
            SET name                   = $1,
                last_modification_time = now(),
                last_modification_user = $2,
                inactivation_time      = CASE WHEN $3 THEN NULL ELSE COALESCE(inactivation_time, now()) END,
                is_active              = $3,
                inactivation_reason    = $4,
                comment                = $5
            WHERE id = $6
            "#,
        )
        .bind(&update.name)
        .bind(actor.get())
        .bind(update.is_active)
        .bind(&update.inactivation_reason)
        .bind(&update.comment)
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_group", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("group {id}")));
        }
        GroupStore::get(self, id).await
    }

    #[instrument(skip(self), fields(group_id = %id), err)]
    async fn delete(&self, id: GroupId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM go_group WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_group", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("group {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn find_id_by_login_name(&self, login_name: &str) -> Result<UserId, StoreError> {
        let id: Option<i32> = sqlx::query_scalar("SELECT id FROM go_user WHERE username = $1")
            .bind(login_name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_id_by_login_name", e))?;
        id.map(UserId::new)
            .ok_or_else(|| StoreError::not_found(format!("login name '{login_name}'")))
    }

    async fn load_auth_record(&self, id: UserId) -> Result<AuthRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, name, email, password_hash, is_admin, is_locked, is_active,
                   bad_password_count
            FROM go_user
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_auth_record", e))?
        .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;

        AuthRecordRow::from_row(&row)
            .map(Into::into)
            .map_err(|e| map_sqlx_error("load_auth_record", e))
    }

    async fn is_active(&self, id: UserId) -> Result<bool, StoreError> {
        self.flag(id, "SELECT is_active FROM go_user WHERE id = $1", "is_active")
            .await
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError> {
        self.flag(id, "SELECT is_admin FROM go_user WHERE id = $1", "is_admin")
            .await
    }

    async fn is_locked(&self, id: UserId) -> Result<bool, StoreError> {
        self.flag(id, "SELECT is_locked FROM go_user WHERE id = $1", "is_locked")
            .await
    }

    async fn account_state(&self, id: UserId) -> Result<AccountState, StoreError> {
        let row: Option<(bool, bool)> =
            sqlx::query_as("SELECT is_active, is_locked FROM go_user WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("account_state", e))?;
        row.map(|(is_active, is_locked)| AccountState {
            is_active,
            is_locked,
        })
        .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    #[instrument(skip(self, new_digest), fields(user_id = %id, actor = %actor), err)]
    async fn reset_password(&self, id: UserId, new_digest: &str, actor: UserId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE go_user
            SET password_hash          = $1,
                is_locked              = false,
                bad_password_count     = 0,
                last_modification_time = now(),
                last_modification_user = $2
            WHERE id = $3
            "#,
        )
        .bind(new_digest)
        .bind(actor.get())
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reset_password", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        Ok(())
    }
}

impl PostgresStore {
    async fn flag(&self, id: UserId, sql: &'static str, operation: &str) -> Result<bool, StoreError> {
        let value: Option<bool> = sqlx::query_scalar(sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        value.ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[derive(Debug)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    username: String,
    external_id: Option<i32>,
    orgunit_id: Option<i32>,
    groups_id: Vec<i32>,
    phone: Option<String>,
    is_locked: bool,
    is_admin: bool,
    create_time: DateTime<Utc>,
    creator: i32,
    last_modification_time: Option<DateTime<Utc>>,
    last_modification_user: Option<i32>,
    is_active: bool,
    inactivation_time: Option<DateTime<Utc>>,
    inactivation_reason: Option<String>,
    comment: Option<String>,
    bad_password_count: i32,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            external_id: row.try_get("external_id")?,
            orgunit_id: row.try_get("orgunit_id")?,
            groups_id: row.try_get("groups_id")?,
            phone: row.try_get("phone")?,
            is_locked: row.try_get("is_locked")?,
            is_admin: row.try_get("is_admin")?,
            create_time: row.try_get("create_time")?,
            creator: row.try_get("creator")?,
            last_modification_time: row.try_get("last_modification_time")?,
            last_modification_user: row.try_get("last_modification_user")?,
            is_active: row.try_get("is_active")?,
            inactivation_time: row.try_get("inactivation_time")?,
            inactivation_reason: row.try_get("inactivation_reason")?,
            comment: row.try_get("comment")?,
            bad_password_count: row.try_get("bad_password_count")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            name: row.name,
            email: row.email,
            username: row.username,
            external_id: row.external_id,
            orgunit_id: row.orgunit_id,
            groups_id: row.groups_id.into_iter().map(GroupId::new).collect(),
            phone: row.phone,
            is_locked: row.is_locked,
            is_admin: row.is_admin,
            create_time: row.create_time,
            creator: UserId::new(row.creator),
            last_modification_time: row.last_modification_time,
            last_modification_user: row.last_modification_user.map(UserId::new),
            is_active: row.is_active,
            inactivation_time: row.inactivation_time,
            inactivation_reason: row.inactivation_reason,
            comment: row.comment,
            bad_password_count: row.bad_password_count,
        }
    }
}

#[derive(Debug)]
struct UserSummaryRow {
    id: i32,
    name: String,
    email: String,
    username: String,
    creator: i32,
    create_time: DateTime<Utc>,
    is_admin: bool,
    is_locked: bool,
    is_active: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserSummaryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserSummaryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            creator: row.try_get("creator")?,
            create_time: row.try_get("create_time")?,
            is_admin: row.try_get("is_admin")?,
            is_locked: row.try_get("is_locked")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        UserSummary {
            id: UserId::new(row.id),
            name: row.name,
            email: row.email,
            username: row.username,
            creator: UserId::new(row.creator),
            create_time: row.create_time,
            is_admin: row.is_admin,
            is_locked: row.is_locked,
            is_active: row.is_active,
        }
    }
}

struct AuthRecordRow {
    id: i32,
    username: String,
    name: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    is_locked: bool,
    is_active: bool,
    bad_password_count: i32,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AuthRecordRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AuthRecordRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_admin: row.try_get("is_admin")?,
            is_locked: row.try_get("is_locked")?,
            is_active: row.try_get("is_active")?,
            bad_password_count: row.try_get("bad_password_count")?,
        })
    }
}

impl From<AuthRecordRow> for AuthRecord {
    fn from(row: AuthRecordRow) -> Self {
        AuthRecord {
            id: UserId::new(row.id),
            login_name: row.username,
            display_name: row.name,
            email: row.email,
            credential_digest: row.password_hash,
            is_admin: row.is_admin,
            is_locked: row.is_locked,
            is_active: row.is_active,
            bad_credential_count: row.bad_password_count,
        }
    }
}

#[derive(Debug)]
struct GroupRow {
    id: i32,
    name: String,
    create_time: DateTime<Utc>,
    creator: i32,
    last_modification_time: Option<DateTime<Utc>>,
    last_modification_user: Option<i32>,
    is_active: bool,
    inactivation_time: Option<DateTime<Utc>>,
    inactivation_reason: Option<String>,
    comment: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for GroupRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(GroupRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            create_time: row.try_get("create_time")?,
            creator: row.try_get("creator")?,
            last_modification_time: row.try_get("last_modification_time")?,
            last_modification_user: row.try_get("last_modification_user")?,
            is_active: row.try_get("is_active")?,
            inactivation_time: row.try_get("inactivation_time")?,
            inactivation_reason: row.try_get("inactivation_reason")?,
            comment: row.try_get("comment")?,
        })
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: GroupId::new(row.id),
            name: row.name,
            create_time: row.create_time,
            creator: UserId::new(row.creator),
            last_modification_time: row.last_modification_time,
            last_modification_user: row.last_modification_user.map(UserId::new),
            is_active: row.is_active,
            inactivation_time: row.inactivation_time,
            inactivation_reason: row.inactivation_reason,
            comment: row.comment,
        }
    }
}
