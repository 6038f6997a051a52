use axum::{
    Router,
    routing::{get, put},
};

pub mod groups;
pub mod login;
pub mod password_reset;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/login", get(login::login_hint).post(login::login))
        .route(
            "/resetpassword",
            get(password_reset::request_form).post(password_reset::request_reset),
        )
        .route(
            "/resetpassword/:token",
            get(password_reset::reset_form).post(password_reset::apply_reset),
        )
}

/// Router for all authenticated endpoints, nested under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(system::status))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/maxid", get(users::max_user_id))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/changepassword", put(users::change_password))
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/:id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
}
