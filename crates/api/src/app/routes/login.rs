use std::sync::Arc;

use axum::{Extension, Json};

use crate::app::dto::{LoginRequest, LoginResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn login_hint() -> &'static str {
    "you must post login credentials"
}

/// Exchange a login name and credential digest for a bearer token.
///
/// Unknown names, inactive or locked accounts and wrong credentials all
/// produce the same 401 body.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let issued = services
        .authenticator
        .login(&body.login_name, &body.credential_digest)
        .await?;
    Ok(Json(LoginResponse {
        token: issued.token,
    }))
}
