//! Authentication service layer
//!
//! Business logic for registration, credential validation, sessions and
//! token issuance. Storage goes through the `UserStore` / `SessionStore`
//! traits so the same service runs on PostgreSQL or in memory.

use super::jwt::{sign_jwt, verify_jwt, JwtConfig};
use super::password::{verify_password, PasswordConfig};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sesame_core::{
    AuthConfig, NewUser, Session, SessionFilter, SessionPatch, SessionStore, TokenTtl,
    UserProfile, UserStore,
};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Not a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 6, message = "Password too short, should be 6 chars minimum"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access and refresh tokens issued at login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Logout response; both tokens are always null
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// A fresh access token minted from a refresh token
#[derive(Debug, Clone)]
pub struct ReissuedAccess {
    pub access_token: String,
    pub user: UserProfile,
    pub session: Uuid,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    jwt_config: JwtConfig,
    access_token_ttl: TokenTtl,
    refresh_token_ttl: TokenTtl,
    password_config: PasswordConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        auth: &AuthConfig,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt_config: JwtConfig::from(auth),
            access_token_ttl: auth.access_token_ttl,
            refresh_token_ttl: auth.refresh_token_ttl,
            password_config,
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt_config
    }

    pub fn access_token_ttl(&self) -> TokenTtl {
        self.access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> TokenTtl {
        self.refresh_token_ttl
    }

    /// Register a new user
    ///
    /// # Returns
    ///
    /// * `Ok(UserProfile)` - Newly created user
    /// * `Err(AppError::BadRequest)` - Request failed validation
    /// * `Err(AppError::Conflict)` - Email already registered
    pub async fn create_user(&self, request: RegisterRequest) -> Result<UserProfile, AppError> {
        request.validate()?;

        let config = self.password_config.clone();
        let password = request.password;
        let password_hash = run_blocking(move || config.hash(&password)).await??;
        let user = self
            .users
            .create_user(NewUser {
                email: request.email,
                name: request.name,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.profile())
    }

    /// Check credentials, returning the user's profile when they match
    ///
    /// Unknown emails, wrong passwords and unreadable stored hashes all
    /// yield `None`. An unknown email still pays for one Argon2 run so it
    /// takes about as long as a wrong password.
    pub async fn validate_password(
        &self,
        credentials: &LoginRequest,
    ) -> Result<Option<UserProfile>, AppError> {
        let password = credentials.password.clone();

        let Some(user) = self.users.find_user_by_email(&credentials.email).await? else {
            let config = self.password_config.clone();
            let _ = run_blocking(move || config.hash(&password)).await?;
            return Ok(None);
        };

        let stored_hash = user.password_hash.clone();
        match run_blocking(move || verify_password(&password, &stored_hash)).await? {
            Ok(true) => Ok(Some(user.profile())),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password hash rejected");
                Ok(None)
            }
        }
    }

    pub async fn create_session(&self, user_id: Uuid, user_agent: &str) -> Result<Session, AppError> {
        Ok(self.sessions.create_session(user_id, user_agent).await?)
    }

    pub async fn find_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, AppError> {
        Ok(self.sessions.find_sessions(filter).await?)
    }

    pub async fn update_session(
        &self,
        filter: &SessionFilter,
        patch: &SessionPatch,
    ) -> Result<(), AppError> {
        Ok(self.sessions.update_session(filter, patch).await?)
    }

    /// Sign an access and a refresh token for a session
    ///
    /// Both carry the same claims and differ only in expiry.
    pub fn issue_token_pair(&self, user: &UserProfile, session: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: sign_jwt(&self.jwt_config, user, session, self.access_token_ttl)?,
            refresh_token: sign_jwt(&self.jwt_config, user, session, self.refresh_token_ttl)?,
        })
    }

    /// Mint a new access token from a refresh token
    ///
    /// Returns `None` unless the refresh token verifies and its session
    /// still exists and is valid.
    pub async fn reissue_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<ReissuedAccess>, AppError> {
        let claims = match verify_jwt(&self.jwt_config, refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Refresh token rejected");
                return Ok(None);
            }
        };

        let Some(session) = self.sessions.find_session(claims.session).await? else {
            return Ok(None);
        };
        if !session.valid {
            tracing::debug!(session_id = %session.id, "Refresh token for invalidated session");
            return Ok(None);
        }

        let Some(user) = self.users.find_user(session.user_id).await? else {
            return Ok(None);
        };

        let user = user.profile();
        let access_token = sign_jwt(&self.jwt_config, &user, session.id, self.access_token_ttl)?;

        Ok(Some(ReissuedAccess {
            access_token,
            user,
            session: session.id,
        }))
    }
}

/// Run CPU-bound work off the async executor
async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {e}")))
}
