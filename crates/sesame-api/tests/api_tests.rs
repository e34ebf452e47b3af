//! API Integration Tests
//!
//! All tests run against the in-memory store.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sesame_api::auth::{encode_claims, verify_jwt, Claims};
use sesame_api::{create_router, create_router_for_testing, state::AppState};
use sesame_core::{AppConfig, TokenTtl};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "s3same-open";

fn test_app_with(config: AppConfig) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::for_testing(config));
    (create_router(state.clone()), state)
}

fn test_app() -> (Router, Arc<AppState>) {
    test_app_with(AppConfig::default())
}

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("User-Agent", "sesame-tests/1.0");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn cookie_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

async fn register(app: &Router, email: &str) -> Value {
    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/users",
            Some(json!({
                "email": email,
                "name": "Jane Doe",
                "password": PASSWORD,
                "passwordConfirmation": PASSWORD,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn login(app: &Router, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(create_json_request(
            "POST",
            "/api/sessions",
            Some(json!({ "email": email, "password": password })),
        ))
        .await
        .unwrap()
}

/// Register, log in, and return `(accessToken, refreshToken)`
async fn login_tokens(app: &Router, email: &str) -> (String, String) {
    let response = login(app, email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    (
        json["accessToken"].as_str().unwrap().to_string(),
        json["refreshToken"].as_str().unwrap().to_string(),
    )
}

async fn list_sessions(app: &Router, token: &str) -> Response<Body> {
    app.clone()
        .oneshot(bearer_request("GET", "/api/sessions", token))
        .await
        .unwrap()
}

fn expired_copy(state: &AppState, token: &str) -> String {
    let claims = verify_jwt(state.auth.jwt_config(), token).unwrap();
    let now = chrono::Utc::now().timestamp() as u64;
    let expired = Claims {
        iat: now - 120,
        exp: now - 60,
        ..claims
    };
    encode_claims(state.auth.jwt_config(), &expired).unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/sessions"].is_object());
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_profile_without_password() {
    let (app, _) = test_app();

    let user = register(&app, "jane@example.com").await;

    assert_eq!(user["email"], "jane@example.com");
    assert_eq!(user["name"], "Jane Doe");
    assert!(user["id"].is_string());
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _) = test_app();

    let cases = [
        json!({ "email": "not-an-email", "name": "Jane", "password": PASSWORD, "passwordConfirmation": PASSWORD }),
        json!({ "email": "jane@example.com", "name": "", "password": PASSWORD, "passwordConfirmation": PASSWORD }),
        json!({ "email": "jane@example.com", "name": "Jane", "password": "short", "passwordConfirmation": "short" }),
        json!({ "email": "jane@example.com", "name": "Jane", "password": PASSWORD, "passwordConfirmation": "different" }),
    ];

    for body in cases {
        let response = app
            .clone()
            .oneshot(create_json_request("POST", "/api/users", Some(body.clone())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/users",
            Some(json!({
                "email": "jane@example.com",
                "name": "Other Jane",
                "password": PASSWORD,
                "passwordConfirmation": PASSWORD,
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_sets_tokens_and_cookies() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;

    let response = login(&app, "jane@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);

    let access = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .expect("access cookie");
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refreshToken="))
        .expect("refresh cookie");

    for cookie in [access, refresh] {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Domain=localhost"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
    }
    assert!(access.contains("Max-Age=900;"));
    assert!(refresh.contains("Max-Age=31540000;"));

    let json = body_json(response).await;
    let access_token = json["accessToken"].as_str().unwrap();
    let refresh_token = json["refreshToken"].as_str().unwrap();
    assert!(access.starts_with(&format!("accessToken={access_token};")));
    assert!(refresh.starts_with(&format!("refreshToken={refresh_token};")));
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;

    for (email, password) in [
        ("jane@example.com", "wrong-password"),
        ("nobody@example.com", PASSWORD),
    ] {
        let response = login(&app, email, password).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(body_bytes(response).await, b"Invalid email or password");
    }
}

#[tokio::test]
async fn test_token_expiry_follows_configured_ttls() {
    let mut config = AppConfig::default();
    config.auth.access_token_ttl = TokenTtl::from_secs(120);
    config.auth.refresh_token_ttl = TokenTtl::from_secs(7 * 24 * 3600);
    let (app, state) = test_app_with(config);

    let user = register(&app, "jane@example.com").await;
    let (access_token, refresh_token) = login_tokens(&app, "jane@example.com").await;

    let access = verify_jwt(state.auth.jwt_config(), &access_token).unwrap();
    let refresh = verify_jwt(state.auth.jwt_config(), &refresh_token).unwrap();

    assert_eq!(access.exp - access.iat, 120);
    assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 3600);
    assert_eq!(access.session, refresh.session);
    assert_eq!(access.user.id.to_string(), user["id"].as_str().unwrap());
}

// =============================================================================
// Session Listing and Logout Tests
// =============================================================================

#[tokio::test]
async fn test_list_sessions_requires_user() {
    let (app, _) = test_app();

    let anonymous = app
        .clone()
        .oneshot(create_json_request("GET", "/api/sessions", None))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

    let garbage = list_sessions(&app, "not.a.token").await;
    assert_eq!(garbage.status(), StatusCode::FORBIDDEN);

    let logout = app
        .clone()
        .oneshot(create_json_request("DELETE", "/api/sessions", None))
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_sessions_after_login() {
    let (app, state) = test_app();
    let user = register(&app, "jane@example.com").await;
    let (access_token, _) = login_tokens(&app, "jane@example.com").await;
    let session_id = verify_jwt(state.auth.jwt_config(), &access_token)
        .unwrap()
        .session;

    let response = list_sessions(&app, &access_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let sessions = body_json(response).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], session_id.to_string());
    assert_eq!(sessions[0]["user"], user["id"]);
    assert_eq!(sessions[0]["valid"], true);
    assert_eq!(sessions[0]["userAgent"], "sesame-tests/1.0");
}

/// Log in with a raw request so the caller controls the `User-Agent` header
async fn login_with_agent(app: &Router, email: &str, user_agent: Option<&[u8]>) -> String {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/sessions")
        .header("Content-Type", "application/json");
    if let Some(agent) = user_agent {
        builder = builder.header(header::USER_AGENT, agent);
    }
    let request = builder
        .body(Body::from(
            json!({ "email": email, "password": PASSWORD }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_login_without_user_agent_records_empty_string() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;
    let access_token = login_with_agent(&app, "jane@example.com", None).await;

    let sessions = body_json(list_sessions(&app, &access_token).await).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["userAgent"], "");
}

#[tokio::test]
async fn test_login_keeps_non_ascii_user_agent() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;
    let access_token =
        login_with_agent(&app, "jane@example.com", Some("Navigateur/2.0 (Café)".as_bytes())).await;

    let sessions = body_json(list_sessions(&app, &access_token).await).await;
    assert_eq!(sessions[0]["userAgent"], "Navigateur/2.0 (Café)");
}

#[tokio::test]
async fn test_access_cookie_authenticates() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, _) = login_tokens(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(cookie_request(
            "GET",
            "/api/sessions",
            &format!("accessToken={access_token}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sessions_are_scoped_to_user() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;
    register(&app, "john@example.com").await;
    let (jane_token, _) = login_tokens(&app, "jane@example.com").await;
    login_tokens(&app, "jane@example.com").await;
    let (john_token, _) = login_tokens(&app, "john@example.com").await;

    let jane = body_json(list_sessions(&app, &jane_token).await).await;
    let john = body_json(list_sessions(&app, &john_token).await).await;

    assert_eq!(jane.as_array().unwrap().len(), 2);
    assert_eq!(john.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let (app, state) = test_app();
    register(&app, "jane@example.com").await;
    let (first_token, _) = login_tokens(&app, "jane@example.com").await;
    let (second_token, _) = login_tokens(&app, "jane@example.com").await;
    let first_session = verify_jwt(state.auth.jwt_config(), &first_token)
        .unwrap()
        .session;

    let response = app
        .clone()
        .oneshot(bearer_request("DELETE", "/api/sessions", &first_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(
        body_json(response).await,
        json!({ "accessToken": null, "refreshToken": null })
    );

    let sessions = body_json(list_sessions(&app, &second_token).await).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_ne!(sessions[0]["id"], first_session.to_string());

    // Access tokens stay usable until they expire
    let still_usable = list_sessions(&app, &first_token).await;
    assert_eq!(still_usable.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_twice_is_harmless() {
    let (app, _) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, _) = login_tokens(&app, "jane@example.com").await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(bearer_request("DELETE", "/api/sessions", &access_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "accessToken": null, "refreshToken": null })
        );
    }
}

// =============================================================================
// Access Token Reissue Tests
// =============================================================================

#[tokio::test]
async fn test_expired_access_token_is_reissued() {
    let (app, state) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, refresh_token) = login_tokens(&app, "jane@example.com").await;
    let expired = expired_copy(&state, &access_token);

    let response = app
        .clone()
        .oneshot(cookie_request(
            "GET",
            "/api/sessions",
            &format!("accessToken={expired}; refreshToken={refresh_token}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let new_token = response
        .headers()
        .get("x-access-token")
        .expect("reissued token header")
        .to_str()
        .unwrap()
        .to_string();
    let claims = verify_jwt(state.auth.jwt_config(), &new_token).unwrap();
    assert_eq!(
        claims.session,
        verify_jwt(state.auth.jwt_config(), &access_token).unwrap().session
    );

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with(&format!("accessToken={new_token};")));

    let sessions = body_json(response).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_refresh_header_and_bearer_token() {
    let (app, state) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, refresh_token) = login_tokens(&app, "jane@example.com").await;
    let expired = expired_copy(&state, &access_token);

    let request = Request::builder()
        .method("GET")
        .uri("/api/sessions")
        .header(header::AUTHORIZATION, format!("Bearer {expired}"))
        .header("x-refresh", refresh_token)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-access-token"));
}

#[tokio::test]
async fn test_expired_access_token_without_refresh() {
    let (app, state) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, _) = login_tokens(&app, "jane@example.com").await;
    let expired = expired_copy(&state, &access_token);

    let response = list_sessions(&app, &expired).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key("x-access-token"));
}

#[tokio::test]
async fn test_no_reissue_after_logout() {
    let (app, state) = test_app();
    register(&app, "jane@example.com").await;
    let (access_token, refresh_token) = login_tokens(&app, "jane@example.com").await;

    let logout = app
        .clone()
        .oneshot(bearer_request("DELETE", "/api/sessions", &access_token))
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    let expired = expired_copy(&state, &access_token);
    let response = app
        .clone()
        .oneshot(cookie_request(
            "GET",
            "/api/sessions",
            &format!("accessToken={expired}; refreshToken={refresh_token}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key("x-access-token"));
    assert!(set_cookies(&response).is_empty());
}
