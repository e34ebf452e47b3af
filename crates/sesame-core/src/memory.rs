//! In-memory user and session store
//!
//! Used for tests and for running the server without PostgreSQL. Contents
//! are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{SessionStore, UserStore};
use crate::{NewUser, Result, Session, SessionFilter, SessionPatch, SesameError, User};

/// Process-local store backed by `RwLock`-guarded collections
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    // Insertion ordered, so listings come back in creation order
    sessions: RwLock<Vec<Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(SesameError::Conflict(format!(
                "Email already registered: {}",
                user.email
            )));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, user_id: Uuid, user_agent: &str) -> Result<Session> {
        let session = Session::new(user_id, user_agent);
        self.sessions.write().await.push(session.clone());
        Ok(session)
    }

    async fn find_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn update_session(&self, filter: &SessionFilter, patch: &SessionPatch) -> Result<()> {
        if filter.is_empty() {
            return Err(SesameError::ValidationError(
                "Refusing to update sessions without a filter".to_string(),
            ));
        }

        let mut sessions = self.sessions.write().await;
        let changed = sessions
            .iter_mut()
            .filter(|s| filter.matches(s))
            .map(|s| s.apply(patch))
            .filter(|changed| *changed)
            .count();

        tracing::debug!(changed, "Updated sessions");
        Ok(())
    }
}
