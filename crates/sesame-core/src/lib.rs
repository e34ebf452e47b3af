//! Sesame Core - Domain models, configuration, and session storage
//!
//! This crate defines the core abstractions used by the Sesame API server:
//! - User and session models
//! - Session filters and patches used by the store layer
//! - Common error types
//! - Store traits with in-memory and PostgreSQL backends
//! - Configuration management

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig, TokenTtl,
};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{SessionStore, UserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Sesame operations
#[derive(Error, Debug)]
pub enum SesameError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub type Result<T> = std::result::Result<T, SesameError>;

// ============================================================================
// Users
// ============================================================================

/// Stored user account
///
/// The password hash is an Argon2id PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Public projection of this account, safe to embed in tokens and responses
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation
///
/// This is the user object merged into access and refresh token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

// ============================================================================
// Sessions
// ============================================================================

/// A login instance
///
/// Sessions are never deleted; logout flips `valid` to false. There is no
/// path back from invalid to valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    /// Owning user id
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub valid: bool,
    /// Client `User-Agent` at login, empty when the header was absent
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh, valid session for a user
    pub fn new(user_id: Uuid, user_agent: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            valid: true,
            user_agent: user_agent.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch, returning whether anything changed
    pub fn apply(&mut self, patch: &SessionPatch) -> bool {
        let mut changed = false;
        if let Some(valid) = patch.valid {
            // Invalidation is one-way
            if self.valid && !valid {
                self.valid = false;
                changed = true;
            }
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

/// Session selection criteria
///
/// Every field that is set must match. An empty filter matches all sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub valid: Option<bool>,
}

impl SessionFilter {
    /// Match a single session by id
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Match the valid sessions of a user
    pub fn valid_for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            valid: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.user_id.is_none() && self.valid.is_none()
    }

    pub fn matches(&self, session: &Session) -> bool {
        self.id.map_or(true, |id| session.id == id)
            && self.user_id.map_or(true, |user| session.user_id == user)
            && self.valid.map_or(true, |valid| session.valid == valid)
    }
}

/// Changes to apply to matching sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub valid: Option<bool>,
}

impl SessionPatch {
    pub fn invalidate() -> Self {
        Self { valid: Some(false) }
    }
}
