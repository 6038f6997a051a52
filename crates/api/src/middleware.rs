use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use usergroup_auth::SessionGuard;

use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    pub guard: SessionGuard,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?.to_owned();

    let claims = state.guard.check(&token).await.map_err(|e| {
        if e.is_internal() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            tracing::debug!(reason = %e, "request rejected by session guard");
            StatusCode::UNAUTHORIZED
        }
    })?;

    req.extensions_mut().insert(SessionContext::new(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
