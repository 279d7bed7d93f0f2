use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::{require_admin, require_auth};
use crate::{promises, users};

/// The full HTTP surface. Public auth routes, bearer-protected user and
/// promise routes, and an admin-only block behind both guards.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(auth::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/users/username/{username}", get(users::get_user_by_username))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/user/me",
            get(users::get_me).put(users::update_me).delete(users::delete_me),
        )
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/promises", get(promises::list_user_promises))
        .route(
            "/promises",
            get(promises::list_promises).post(promises::create_promise),
        )
        .route(
            "/promises/{promise_id}",
            get(promises::get_promise)
                .put(promises::update_promise)
                .delete(promises::delete_promise),
        )
        .route("/promises/{promise_id}/progress", get(promises::list_progress))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{user_id}", put(users::admin_update_user))
        .route("/admin/users/{user_id}", delete(users::admin_delete_user))
        .route("/admin/promises", get(promises::list_promises))
        .route("/admin/promises/{promise_id}", delete(promises::delete_promise))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
