//! JWT token signing and verification
//!
//! Access and refresh tokens share one claim layout: the user's public
//! profile merged with the session id. They differ only in expiry.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sesame_core::{AuthConfig, TokenTtl, UserProfile};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure
///
/// The profile fields are flattened into the top level of the claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub user: UserProfile,
    /// Session this token was issued for
    pub session: Uuid,
    /// Token issuer
    pub iss: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// JWT signing and verification errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT Configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
        }
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Sign a token for a user's session that expires after `expires_in`
///
/// # Example
///
/// ```no_run
/// use sesame_api::auth::jwt::{sign_jwt, JwtConfig};
/// # fn profile() -> sesame_core::UserProfile { unimplemented!() }
///
/// let config = JwtConfig::default();
/// let token = sign_jwt(&config, &profile(), uuid::Uuid::new_v4(), "15m".parse().unwrap())
///     .expect("Failed to sign token");
/// ```
pub fn sign_jwt(
    config: &JwtConfig,
    user: &UserProfile,
    session: Uuid,
    expires_in: TokenTtl,
) -> Result<String, JwtError> {
    let now = now_secs()?;

    let claims = Claims {
        user: user.clone(),
        session,
        iss: config.issuer.clone(),
        iat: now,
        exp: now.saturating_add(expires_in.as_secs()),
    };

    encode_claims(config, &claims)
}

/// Encode an explicit claim set
pub fn encode_claims(config: &JwtConfig, claims: &Claims) -> Result<String, JwtError> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a token's signature, issuer and expiry and extract its claims
///
/// Expiry is reported separately as `JwtError::ExpiredToken` so callers can
/// fall back to the refresh token.
pub fn verify_jwt(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    // Tokens are only ever checked by the server that signed them
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    Ok(token_data.claims)
}
