//! OpenAPI document
//!
//! Author: hephaex@gmail.com

use crate::auth::{LoginRequest, LogoutResponse, RegisterRequest, TokenPair};
use crate::error::ApiError;
use crate::handlers::{health, sessions, users};
use sesame_core::{Session, UserProfile};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sesame API",
        description = "Session-based authentication with access and refresh tokens",
    ),
    paths(
        health::healthcheck,
        users::create_user_handler,
        sessions::create_user_session_handler,
        sessions::get_user_sessions_handler,
        sessions::delete_session_handler,
    ),
    components(schemas(
        ApiError,
        health::HealthResponse,
        RegisterRequest,
        LoginRequest,
        TokenPair,
        LogoutResponse,
        UserProfile,
        Session,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "users", description = "Account registration"),
        (name = "sessions", description = "Login, session listing and logout"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
