/// Session model and database operations
///
/// A session row binds the SHA-256 digest of a cookie token to a user until
/// `expires_at`. The raw token only ever lives in the client's cookie.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,

    /// Hex SHA-256 of the cookie token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub user_id: Uuid,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl Session {
    /// True once `now` has reached the expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token_hash, user_id, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_token_hash<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, token_hash, user_id, expires_at, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(executor)
        .await
    }

    /// Deletes the session with this digest; returns whether one existed
    pub async fn delete_by_token_hash<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every session of a user, returning how many were removed
    pub async fn delete_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
