//! Schema bootstrap and bootstrap-administrator seeding.

use sqlx::PgPool;
use tracing::instrument;

use usergroup_core::StoreError;

use crate::config::AdminAccount;
use crate::store::postgres::map_sqlx_error;
use crate::store::{BOOTSTRAP_ADMIN_NAME, admin_credential_digest};

const USERS_AND_GROUPS: &str = include_str!("../migrations/0001_users_groups.sql");

/// Create `go_user` and `go_group` when they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(USERS_AND_GROUPS)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    tracing::info!("schema is up to date");
    Ok(())
}

/// Insert or refresh the bootstrap administrator (id 1).
///
/// The account ends up active, unlocked, admin, with a zero bad-credential
/// counter and `bcrypt(sha256(ADMIN_PASSWORD))` as its digest.
#[instrument(skip(pool, admin), fields(username = %admin.username), err)]
pub async fn ensure_admin(pool: &PgPool, admin: &AdminAccount) -> Result<(), StoreError> {
    let digest = admin_credential_digest(admin).map_err(|e| StoreError::backend(e.to_string()))?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("ensure_admin", e))?;

    sqlx::query(
        r#"
        INSERT INTO go_user (id, name, email, username, password_hash, is_admin, creator, comment)
        VALUES (1, $1, $2, $3, $4, true, 1, 'Initial setup of Admin account')
        ON CONFLICT (id) DO UPDATE
        SET username               = EXCLUDED.username,
            password_hash          = EXCLUDED.password_hash,
            is_locked              = false,
            is_admin               = true,
            last_modification_time = now(),
            last_modification_user = 1,
            is_active              = true,
            bad_password_count     = 0
        "#,
    )
    .bind(BOOTSTRAP_ADMIN_NAME)
    .bind(&admin.email)
    .bind(&admin.username)
    .bind(&digest)
    .execute(&mut *tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_admin", e))?;

    // The explicit id bypassed the serial sequence.
    sqlx::query("SELECT setval(pg_get_serial_sequence('go_user', 'id'), GREATEST((SELECT MAX(id) FROM go_user), 1))")
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("ensure_admin", e))?;

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("ensure_admin", e))?;

    tracing::info!("bootstrap administrator ensured");
    Ok(())
}
