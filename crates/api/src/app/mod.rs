//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores and the authenticator shared by handlers
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use chrono::Duration;

use usergroup_auth::{Authenticator, CredentialStore, EmptySigningKey, SessionGuard, TokenCodec};
use usergroup_infra::{GroupStore, UserStore};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
///
/// One store object backs users, groups and credentials.
pub fn build_app<S>(
    store: Arc<S>,
    jwt_secret: &[u8],
    jwt_validity: Duration,
) -> Result<Router, EmptySigningKey>
where
    S: UserStore + GroupStore + CredentialStore + 'static,
{
    let codec = Arc::new(TokenCodec::new(jwt_secret)?);
    let credentials: Arc<dyn CredentialStore> = store.clone();

    let services = Arc::new(services::AppServices {
        users: store.clone(),
        groups: store,
        credentials: credentials.clone(),
        authenticator: Authenticator::new(credentials.clone(), codec.clone(), jwt_validity),
    });
    let auth_state = middleware::AuthState {
        guard: SessionGuard::new(credentials, codec),
    };

    // Protected routes: require a live session.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .nest("/api", protected)
        .layer(Extension(services)))
}
