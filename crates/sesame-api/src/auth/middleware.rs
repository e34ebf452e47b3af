/// Authentication middleware
///
/// `deserialize_user` runs on every API request and attaches an
/// `AuthenticatedUser` when the request carries a usable token. It never
/// rejects a request by itself; `require_user` does that on protected routes.
use super::cookie::{access_token_from, refresh_token_from, NEW_ACCESS_TOKEN_HEADER};
use super::jwt::{verify_jwt, Claims, JwtError};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sesame_core::UserProfile;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identity attached to the request by `deserialize_user`
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Profile embedded in the token
    pub user: UserProfile,
    /// Session the token was issued for
    pub session: Uuid,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user: claims.user,
            session: claims.session,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authenticated user")]
    MissingUser,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingUser => (StatusCode::FORBIDDEN, "Forbidden"),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Resolve the caller's identity from its tokens
///
/// 1. Access token from the `accessToken` cookie or `Authorization: Bearer`
/// 2. Valid token: attach its identity
/// 3. Expired token plus a refresh token whose session is still valid:
///    mint a new access token, return it in `x-access-token` and as a
///    cookie, and attach the identity
/// 4. Anything else: continue anonymously
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use sesame_api::auth::middleware::{deserialize_user, require_user};
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn(require_user))
///     .layer(middleware::from_fn_with_state(state.clone(), deserialize_user))
///     .with_state(state);
/// ```
pub async fn deserialize_user(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(access_token) = access_token_from(request.headers()) else {
        return next.run(request).await;
    };
    let refresh_token = refresh_token_from(request.headers());

    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let refresh_token = match (verify_jwt(state.auth.jwt_config(), &access_token), refresh_token) {
        (Ok(claims), _) => {
            request.extensions_mut().insert(AuthenticatedUser::from(claims));
            return next.run(request).await;
        }
        (Err(JwtError::ExpiredToken), Some(refresh_token)) => refresh_token,
        (Err(e), _) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: e.to_string(),
            });
            return next.run(request).await;
        }
    };

    let reissued = match state.auth.reissue_access_token(&refresh_token).await {
        Ok(Some(reissued)) => reissued,
        Ok(None) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                user_agent,
                reason: "Refresh token rejected".to_string(),
            });
            return next.run(request).await;
        }
        Err(e) => {
            tracing::warn!(error = ?e, "Access token reissue failed");
            return next.run(request).await;
        }
    };

    let token_header = HeaderValue::from_str(&reissued.access_token);
    let cookie = state.cookies.access_cookie(&reissued.access_token);
    let (Ok(token_header), Ok(cookie)) = (token_header, cookie) else {
        tracing::warn!("Reissued access token is not a valid header value");
        return next.run(request).await;
    };

    audit_log(&AuditEvent::AccessTokenReissued {
        user_id: reissued.user.id,
        session_id: reissued.session,
        ip_address,
    });

    request.extensions_mut().insert(AuthenticatedUser {
        user: reissued.user,
        session: reissued.session,
    });

    let mut response = next.run(request).await;
    let response_headers = response.headers_mut();
    response_headers.insert(HeaderName::from_static(NEW_ACCESS_TOKEN_HEADER), token_header);
    response_headers.append(header::SET_COOKIE, cookie);
    response
}

/// Reject requests that `deserialize_user` left anonymous
pub async fn require_user(request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Err(AuthError::MissingUser);
    }

    Ok(next.run(request).await)
}
