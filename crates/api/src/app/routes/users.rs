use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};

use usergroup_auth::{authorize_user_deletion, password, require_admin, require_self_or_admin};
use usergroup_core::{NewUser, User, UserId, UserSummary, UserUpdate};

use crate::app::dto::{ChangePasswordRequest, PageQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::SessionContext;

fn parse_id(raw: &str) -> Result<UserId, ApiError> {
    Ok(raw.parse::<UserId>()?)
}

/// Reject digests that are obviously not one (too short, digest of "").
fn check_digest(field: &str, value: &str) -> Result<(), ApiError> {
    if password::looks_like_valid_digest(value) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "{field} must be a fast digest of a non-empty password"
        )))
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let (offset, limit) = page.resolve().map_err(ApiError::Validation)?;
    Ok(Json(services.users.list(offset, limit).await?))
}

pub async fn max_user_id(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<i32>, ApiError> {
    Ok(Json(services.users.max_id().await?))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    require_self_or_admin(session.claims(), id)?;
    Ok(Json(services.users.get(id).await?))
}

/// Create a user. The submitted fast digest is salted before it is stored.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(mut body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    require_admin(session.claims())?;
    body.validate()?;
    check_digest("password_hash", &body.password_hash)?;

    body.password_hash = password::digest(&body.password_hash)?;
    let user = services.users.create(&body, session.user_id()).await?;

    tracing::info!(user_id = %user.id, creator = %session.user_id(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user.
///
/// Administrators apply the full update, which also clears the bad-credential
/// counter. Anyone else may only edit their own profile fields; a body that
/// changes flags, groups or organisational links is refused.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    require_self_or_admin(session.claims(), id)?;
    body.validate_for(id)?;

    let user = if session.is_admin() {
        services.users.update(id, &body, session.user_id()).await?
    } else {
        let current = services.users.get(id).await?;
        let changed = body.administrative_changes(&current);
        if !changed.is_empty() {
            tracing::info!(user_id = %id, fields = ?changed, "self-service update refused");
            return Err(ApiError::Forbidden(format!(
                "only an administrator may change {}",
                changed.join(", ")
            )));
        }
        services.users.update_profile(id, &body, session.user_id()).await?
    };

    tracing::info!(user_id = %id, actor = %session.user_id(), "user updated");
    Ok(Json(user))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    authorize_user_deletion(session.claims(), id)?;
    services.users.delete(id).await?;
    tracing::info!(user_id = %id, actor = %session.user_id(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a user's credential digest.
///
/// Non-administrators must also present their current digest. On success the
/// account is unlocked and its bad-credential counter cleared.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    require_self_or_admin(session.claims(), id)?;
    check_digest("newCredentialDigest", &body.new_credential_digest)?;

    if !session.is_admin() {
        let old = body.old_credential_digest.as_deref().ok_or_else(|| {
            ApiError::Validation("oldCredentialDigest is required".to_string())
        })?;
        let record = services.credentials.load_auth_record(id).await?;
        if !password::verify(&record.credential_digest, old) {
            tracing::info!(user_id = %id, "password change refused: current credential mismatch");
            return Err(ApiError::Unauthorized);
        }
    }

    let salted = password::digest(&body.new_credential_digest)?;
    services
        .credentials
        .reset_password(id, &salted, session.user_id())
        .await?;

    tracing::info!(user_id = %id, actor = %session.user_id(), "password changed");
    Ok(StatusCode::NO_CONTENT)
}
