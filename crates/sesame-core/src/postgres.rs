//! PostgreSQL user and session store
//!
//! Provides persistent account and session storage using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::store::{SessionStore, UserStore};
use crate::{NewUser, Result, Session, SessionFilter, SessionPatch, SesameError, User};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// PostgreSQL store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| SesameError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create the `users` and `sessions` tables if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| SesameError::DatabaseError(format!("Failed to apply schema: {e}")))?;

        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Append `WHERE ...` clauses for every field set on the filter
fn push_session_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &SessionFilter) {
    let mut separator = " WHERE ";

    if let Some(id) = filter.id {
        builder.push(separator).push("id = ").push_bind(id);
        separator = " AND ";
    }
    if let Some(user_id) = filter.user_id {
        builder.push(separator).push("user_id = ").push_bind(user_id);
        separator = " AND ";
    }
    if let Some(valid) = filter.valid {
        builder.push(separator).push("valid = ").push_bind(valid);
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Session row from database
#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    valid: bool,
    user_agent: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            valid: row.valid,
            user_agent: row.user_agent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING id, email, name, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SesameError::Conflict(format!("Email already registered: {}", user.email))
            } else {
                SesameError::DatabaseError(format!("Failed to create user: {e}"))
            }
        })?;

        Ok(row.into())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, name, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SesameError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(User::from))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, name, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SesameError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(User::from))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, user_id: Uuid, user_agent: &str) -> Result<Session> {
        let row: SessionRow = sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, valid, user_agent, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, NOW(), NOW())
            RETURNING id, user_id, valid, user_agent, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SesameError::DatabaseError(format!("Failed to create session: {e}")))?;

        Ok(row.into())
    }

    async fn find_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, user_id, valid, user_agent, created_at, updated_at FROM sessions",
        );
        push_session_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at");

        let rows: Vec<SessionRow> = builder
            .build_query_as::<SessionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SesameError::DatabaseError(format!("Failed to list sessions: {e}")))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, valid, user_agent, created_at, updated_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SesameError::DatabaseError(format!("Failed to fetch session: {e}")))?;

        Ok(row.map(Session::from))
    }

    async fn update_session(&self, filter: &SessionFilter, patch: &SessionPatch) -> Result<()> {
        if filter.is_empty() {
            return Err(SesameError::ValidationError(
                "Refusing to update sessions without a filter".to_string(),
            ));
        }

        // Only invalidation is a real change; sessions are never reactivated
        if patch.valid != Some(false) {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<Postgres>::new("UPDATE sessions SET valid = FALSE, updated_at = NOW()");
        push_session_filter(&mut builder, filter);
        builder.push(" AND valid = TRUE");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SesameError::DatabaseError(format!("Failed to update session: {e}")))?;

        tracing::debug!(changed = result.rows_affected(), "Updated sessions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_filter_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM sessions");
        push_session_filter(&mut builder, &SessionFilter::valid_for_user(Uuid::new_v4()));
        assert_eq!(
            builder.sql(),
            "SELECT * FROM sessions WHERE user_id = $1 AND valid = $2"
        );
    }

    #[test]
    fn test_session_filter_by_id_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE sessions SET valid = FALSE");
        push_session_filter(&mut builder, &SessionFilter::by_id(Uuid::new_v4()));
        builder.push(" AND valid = TRUE");
        assert_eq!(
            builder.sql(),
            "UPDATE sessions SET valid = FALSE WHERE id = $1 AND valid = TRUE"
        );
    }

    #[test]
    fn test_schema_creates_both_tables() {
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS sessions"));
    }

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::new(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_session_lifecycle() {
        let store = connect().await;
        let user = store
            .create_user(NewUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                name: "Postgres User".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let session = store.create_session(user.id, "pg-test").await.unwrap();
        assert!(session.valid);

        store
            .update_session(&SessionFilter::by_id(session.id), &SessionPatch::invalidate())
            .await
            .unwrap();

        let valid = store
            .find_sessions(&SessionFilter::valid_for_user(user.id))
            .await
            .unwrap();
        assert!(valid.is_empty());

        let stored = store.find_session(session.id).await.unwrap().unwrap();
        assert!(!stored.valid);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_duplicate_email_conflicts() {
        let store = connect().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let new_user = || NewUser {
            email: email.clone(),
            name: "Dup".to_string(),
            password_hash: "hash".to_string(),
        };

        store.create_user(new_user()).await.unwrap();
        let result = store.create_user(new_user()).await;
        assert!(matches!(result, Err(SesameError::Conflict(_))));
    }
}
