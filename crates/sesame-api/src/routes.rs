//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::{deserialize_user, require_user};
use crate::handlers::{sessions, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create the `/api` routes
///
/// Every route sees the caller's identity when one can be resolved; the
/// protected routes reject anonymous callers.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/users", post(users::create_user_handler))
        .route("/sessions", post(sessions::create_user_session_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/sessions",
            get(sessions::get_user_sessions_handler).delete(sessions::delete_session_handler),
        )
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state, deserialize_user))
}
