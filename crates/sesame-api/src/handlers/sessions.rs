//! Session handlers: login, listing and logout
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AuthenticatedUser, LoginRequest, LogoutResponse, TokenPair};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Extension, Json,
};
use sesame_core::{Session, SessionFilter, SessionPatch};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Log in with email and password
///
/// Opens a session and returns an access and a refresh token, both in the
/// body and as `HttpOnly` cookies.
///
/// # Responses
///
/// * `200 OK` - Session created
/// * `401 Unauthorized` - Plain text `Invalid email or password`
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = String, content_type = "text/plain"),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn create_user_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    let Some(user) = state.auth.validate_password(&request).await? else {
        audit_log(&AuditEvent::LoginFailure {
            email: request.email,
            reason: INVALID_CREDENTIALS.to_string(),
            ip_address,
            user_agent,
        });
        return Ok((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS).into_response());
    };

    let session = state
        .auth
        .create_session(user.id, user_agent.as_deref().unwrap_or(""))
        .await?;
    let tokens = state.auth.issue_token_pair(&user, session.id)?;

    let access_cookie = state.cookies.access_cookie(&tokens.access_token)?;
    let refresh_cookie = state.cookies.refresh_cookie(&tokens.refresh_token)?;

    audit_log(&AuditEvent::LoginSuccess {
        user_id: user.id,
        email: user.email,
        session_id: session.id,
        ip_address,
        user_agent,
    });

    Ok((
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        Json(tokens),
    )
        .into_response())
}

/// List the caller's valid sessions
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Valid sessions of the current user", body = Vec<Session>),
        (status = 403, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Session>>, AppError> {
    let sessions = state
        .auth
        .find_sessions(&SessionFilter::valid_for_user(user.user.id))
        .await?;

    Ok(Json(sessions))
}

/// Log out of the current session
///
/// The session is marked invalid. Cookies are left untouched; the body
/// always carries null tokens.
#[utoipa::path(
    delete,
    path = "/api/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Session invalidated", body = LogoutResponse),
        (status = 403, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AppError> {
    state
        .auth
        .update_session(&SessionFilter::by_id(user.session), &SessionPatch::invalidate())
        .await?;

    audit_log(&AuditEvent::Logout {
        user_id: user.user.id,
        email: user.user.email,
        session_id: user.session,
        ip_address: extract_ip_address(&headers),
    });

    Ok(Json(LogoutResponse::default()))
}
