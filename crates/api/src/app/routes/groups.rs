use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};

use usergroup_auth::require_admin;
use usergroup_core::{Group, GroupId, GroupUpdate, NewGroup};

use crate::app::dto::PageQuery;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::SessionContext;

fn parse_id(raw: &str) -> Result<GroupId, ApiError> {
    Ok(raw.parse::<GroupId>()?)
}

pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let (offset, limit) = page.resolve().map_err(ApiError::Validation)?;
    Ok(Json(services.groups.list(offset, limit).await?))
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    require_admin(session.claims())?;
    let id = parse_id(&id)?;
    Ok(Json(services.groups.get(id).await?))
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<NewGroup>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    require_admin(session.claims())?;
    body.validate()?;
    let group = services.groups.create(&body, session.user_id()).await?;
    tracing::info!(group_id = %group.id, creator = %session.user_id(), "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn update_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<GroupUpdate>,
) -> Result<Json<Group>, ApiError> {
    require_admin(session.claims())?;
    let id = parse_id(&id)?;
    body.validate()?;
    Ok(Json(services.groups.update(id, &body, session.user_id()).await?))
}

pub async fn delete_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(session.claims())?;
    let id = parse_id(&id)?;
    services.groups.delete(id).await?;
    tracing::info!(group_id = %id, actor = %session.user_id(), "group deleted");
    Ok(StatusCode::NO_CONTENT)
}
