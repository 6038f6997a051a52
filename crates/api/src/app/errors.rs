use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use usergroup_auth::{AuthzError, DigestError, LoginError};
use usergroup_core::{DomainError, StoreError};

/// Body returned for every failed authentication, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Handler-level error, rendered as `{"error": code, "message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    NotImplemented(&'static str),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Unauthorized => {
                json_error(StatusCode::UNAUTHORIZED, "unauthorized", INVALID_CREDENTIALS)
            }
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::NotImplemented(what) => json_error(
                StatusCode::NOT_IMPLEMENTED,
                "not_implemented",
                format!("{what} is not implemented"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error",
                )
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(msg) => ApiError::Forbidden(msg),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InternalFailure(msg) => ApiError::Internal(msg),
            _ => ApiError::Unauthorized,
        }
    }
}

impl From<DigestError> for ApiError {
    fn from(err: DigestError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
