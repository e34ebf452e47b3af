//! User registration handler
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::RegisterRequest;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use sesame_core::UserProfile;
use std::sync::Arc;

/// Register a new user account
///
/// # Request Body
///
/// * `email` - Valid email address (unique)
/// * `name` - Display name
/// * `password` - At least 6 characters
/// * `passwordConfirmation` - Must equal `password`
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = UserProfile),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state.auth.create_user(request).await?;

    audit_log(&AuditEvent::UserRegistered {
        user_id: user.id,
        email: user.email.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    Ok(Json(user))
}
