//! Self-service password reset by e-mail. Not available yet; every endpoint
//! answers 501.

use axum::extract::Path;

use crate::app::errors::ApiError;

const FEATURE: &str = "password reset by e-mail";

pub async fn request_form() -> ApiError {
    ApiError::NotImplemented(FEATURE)
}

pub async fn request_reset() -> ApiError {
    ApiError::NotImplemented(FEATURE)
}

pub async fn reset_form(Path(_token): Path<String>) -> ApiError {
    ApiError::NotImplemented(FEATURE)
}

pub async fn apply_reset(Path(_token): Path<String>) -> ApiError {
    ApiError::NotImplemented(FEATURE)
}
