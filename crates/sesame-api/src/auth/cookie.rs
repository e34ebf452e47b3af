//! Token cookies and request token extraction
//!
//! Cookie lifetimes are fixed here and are not derived from the configured
//! token TTLs. The refresh cookie outlives a short refresh TTL, and the
//! access cookie can expire before a long access TTL.

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::{Duration, Utc};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Header carrying a refresh token for clients that do not send cookies
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh";
/// Response header carrying a re-issued access token
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// 15 minutes
pub const ACCESS_COOKIE_MAX_AGE_MS: u64 = 900_000;
/// About one year
pub const REFRESH_COOKIE_MAX_AGE_MS: u64 = 31_540_000_000;

/// Attributes applied to every token cookie
///
/// Cookies are always `SameSite=Strict`.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub domain: String,
    pub path: String,
    pub http_only: bool,
    /// Not set: cookies are sent over plain HTTP too
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            path: "/".to_string(),
            http_only: true,
            secure: false,
        }
    }
}

impl CookiePolicy {
    /// `Set-Cookie` value for an access token
    pub fn access_cookie(&self, token: &str) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
        self.cookie(ACCESS_TOKEN_COOKIE, token, ACCESS_COOKIE_MAX_AGE_MS)
    }

    /// `Set-Cookie` value for a refresh token
    pub fn refresh_cookie(&self, token: &str) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
        self.cookie(REFRESH_TOKEN_COOKIE, token, REFRESH_COOKIE_MAX_AGE_MS)
    }

    /// Build a `Set-Cookie` value. `max_age_ms` is rounded down to seconds.
    pub fn cookie(
        &self,
        name: &str,
        value: &str,
        max_age_ms: u64,
    ) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
        let max_age_secs = max_age_ms / 1000;
        let expires = Utc::now() + Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX / 1000));

        let mut cookie = format!(
            "{name}={value}; Max-Age={max_age_secs}; Domain={}; Path={}; Expires={}",
            self.domain,
            self.path,
            expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Strict");

        HeaderValue::from_str(&cookie)
    }
}

/// Find a cookie by name across all `Cookie` request headers
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

/// Token from an `Authorization: Bearer ...` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Access token from the cookie, falling back to the bearer header
pub fn access_token_from(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, ACCESS_TOKEN_COOKIE).or_else(|| extract_bearer_token(headers))
}

/// Refresh token from the cookie, falling back to the `x-refresh` header
pub fn refresh_token_from(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, REFRESH_TOKEN_COOKIE).or_else(|| {
        headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
