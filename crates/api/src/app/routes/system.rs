use axum::{Extension, Json, http::StatusCode};

use usergroup_auth::ClaimSet;

use crate::context::SessionContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// The verified claims of the caller.
pub async fn status(Extension(session): Extension<SessionContext>) -> Json<ClaimSet> {
    Json(session.claims().clone())
}
