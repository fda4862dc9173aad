//! Server-side session records backing token revocation.
//!
//! Both implementations key sessions by the SHA-256 digest of the token so the
//! bearer credential itself is never persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::observability::RequestLogger;

/// One issued, not yet revoked token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: u64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;

    async fn contains(&self, token: &str) -> Result<bool, StoreError>;

    /// Returns whether a record was actually removed
    async fn remove(&self, token: &str) -> Result<bool, StoreError>;

    async fn count_for_user(&self, user_id: u64) -> Result<usize, StoreError>;
}

pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// In-process session store, digest -> user id
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, u64>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .insert(token_digest(&session.token), session.user_id);
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.contains_key(&token_digest(token)))
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(&token_digest(token)).is_some())
    }

    async fn count_for_user(&self, user_id: u64) -> Result<usize, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| *entry.value() == user_id)
            .count())
    }
}

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS auth_sessions (
        token_hash TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL,
        issued_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed session store
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    query_logger: Option<RequestLogger>,
}

impl SqliteSessionStore {
    /// Connect and create the sessions table if it is missing
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            query_logger: None,
        })
    }

    /// Ship every executed statement as an `sql` log record
    pub fn with_query_logger(mut self, logger: RequestLogger) -> Self {
        self.query_logger = Some(logger);
        self
    }

    fn log_query(&self, sql: &str) {
        if let Some(logger) = &self.query_logger {
            logger.log_sql_event(sql);
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        const SQL: &str =
            "INSERT OR REPLACE INTO auth_sessions (token_hash, user_id, issued_at) VALUES (?1, ?2, ?3)";
        self.log_query(SQL);

        sqlx::query(SQL)
            .bind(token_digest(&session.token))
            .bind(session.user_id as i64)
            .bind(session.issued_at.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool, StoreError> {
        const SQL: &str = "SELECT 1 FROM auth_sessions WHERE token_hash = ?1 LIMIT 1";
        self.log_query(SQL);

        let found = sqlx::query_scalar::<_, i64>(SQL)
            .bind(token_digest(token))
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        const SQL: &str = "DELETE FROM auth_sessions WHERE token_hash = ?1";
        self.log_query(SQL);

        let result = sqlx::query(SQL)
            .bind(token_digest(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_for_user(&self, user_id: u64) -> Result<usize, StoreError> {
        const SQL: &str = "SELECT COUNT(*) FROM auth_sessions WHERE user_id = ?1";
        self.log_query(SQL);

        let count = sqlx::query_scalar::<_, i64>(SQL)
            .bind(user_id as i64)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(token: &str, user_id: u64) -> Session {
        Session {
            token: token.to_string(),
            user_id,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("abc"));
        assert_ne!(digest, token_digest("abd"));
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::new();
        store.insert(&session("t1", 1)).await.unwrap();
        store.insert(&session("t2", 1)).await.unwrap();

        assert!(store.contains("t1").await.unwrap());
        assert_eq!(store.count_for_user(1).await.unwrap(), 2);

        assert!(store.remove("t1").await.unwrap());
        assert!(!store.remove("t1").await.unwrap());
        assert!(!store.contains("t1").await.unwrap());
        assert!(store.contains("t2").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_store_lifecycle() {
        let store = SqliteSessionStore::connect("sqlite::memory:").await.unwrap();
        store.insert(&session("t1", 7)).await.unwrap();

        assert!(store.contains("t1").await.unwrap());
        assert!(!store.contains("unknown").await.unwrap());
        assert_eq!(store.count_for_user(7).await.unwrap(), 1);

        assert!(store.remove("t1").await.unwrap());
        assert!(!store.remove("t1").await.unwrap());
        assert_eq!(store.count_for_user(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_store_never_persists_raw_token() {
        let store = SqliteSessionStore::connect("sqlite::memory:").await.unwrap();
        store.insert(&session("raw-token-value", 3)).await.unwrap();

        let stored: (String, i64) =
            sqlx::query_as("SELECT token_hash, issued_at FROM auth_sessions LIMIT 1")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(stored.0, token_digest("raw-token-value"));
        assert!(stored.1 > 0);
    }
}
