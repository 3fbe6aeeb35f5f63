/// Password reset token model and database operations
///
/// Tokens are single-use and short-lived. At most one unused token per user
/// is valid: issuing a new one marks the outstanding ones used first.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE password_reset_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     used_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,

    #[serde(skip_serializing)]
    pub token_hash: String,

    pub user_id: Uuid,

    pub expires_at: DateTime<Utc>,

    /// Set once the token is consumed or superseded
    pub used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Unused and not yet expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }

    /// Marks every unused token of the user as used
    pub async fn invalidate_outstanding<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $2
            WHERE user_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token_hash, user_id, expires_at, used_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Marks the token used if it is still usable
    ///
    /// The conditional update is the lookup: `None` means the token is
    /// unknown, already used or expired, and nothing was changed.
    pub async fn claim<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $2
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING id, token_hash, user_id, expires_at, used_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_usable() {
        let now = Utc::now();
        let mut token = PasswordResetToken {
            id: Uuid::new_v4(),
            token_hash: "a".repeat(64),
            user_id: Uuid::new_v4(),
            expires_at: now + Duration::minutes(30),
            used_at: None,
            created_at: now,
        };

        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + Duration::minutes(30)));

        token.used_at = Some(now);
        assert!(!token.is_usable(now));
    }
}
