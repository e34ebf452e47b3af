//! Storage traits for users and sessions
//!
//! Handlers and services only see these traits; the server picks a backend
//! at startup (PostgreSQL when a database URL is configured, memory otherwise).

use async_trait::async_trait;
use uuid::Uuid;

use crate::{NewUser, Result, Session, SessionFilter, SessionPatch, User};

/// Trait for user account operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store a new user. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Look up a user by email address
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by id
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
}

/// Trait for session operations
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a valid session for a user
    async fn create_session(&self, user_id: Uuid, user_agent: &str) -> Result<Session>;

    /// Return every session matching the filter
    async fn find_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    /// Look up a single session by id
    async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Apply a patch to every session matching the filter.
    ///
    /// An empty filter is rejected with `ValidationError`.
    async fn update_session(&self, filter: &SessionFilter, patch: &SessionPatch) -> Result<()>;
}
