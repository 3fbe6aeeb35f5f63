/// User model and database operations
///
/// Users authenticate with an email and password, or by redeeming an
/// activation code. Tenant access comes from the Membership model.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     is_super_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// All query functions accept any Postgres executor, so they run equally on
/// the pool or inside a transaction (`&mut *tx`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email::text AS email, password_hash, name, is_super_admin, \
                            created_at, updated_at, last_login_at";

/// User model representing an account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address, stored trimmed and lowercase
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,

    /// Grants unscoped access to every tenant
    pub is_super_admin: bool,

    /// When the user account was created
    pub created_at: DateTime<Utc>,

    /// When the user account was last updated
    pub updated_at: DateTime<Utc>,

    /// When the user last signed in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (normalized by [`normalize_email`] before insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,

    /// Super-admin flag, only ever set by administrative seeding
    #[serde(default)]
    pub is_super_admin: bool,
}

/// Canonical email form: surrounding whitespace removed, lowercase
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email exists.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateUser,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, name, is_super_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.is_super_admin)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email address
    ///
    /// Lookup is case-insensitive (CITEXT) and the input is normalized first.
    pub async fn find_by_email<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email or creates one with the given placeholder hash
    ///
    /// Existing users keep their password hash and get `last_login_at`
    /// touched. New users are created with `last_login_at = now`.
    pub async fn upsert_for_sign_in<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
        placeholder_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $3, $3)
            ON CONFLICT (email) DO UPDATE
                SET last_login_at = EXCLUDED.last_login_at
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .bind(placeholder_hash)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Creates or overwrites a user for administrative seeding
    ///
    /// An existing user gets the new password hash, the name (when given) and
    /// the super-admin flag.
    pub async fn upsert_seeded<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateUser,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, name, is_super_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (email) DO UPDATE
                SET password_hash = EXCLUDED.password_hash,
                    name = COALESCE(EXCLUDED.name, users.name),
                    is_super_admin = EXCLUDED.is_super_admin,
                    updated_at = EXCLUDED.updated_at
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.is_super_admin)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Replaces the password hash
    ///
    /// Returns false if the user doesn't exist.
    pub async fn update_password_hash<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    ///
    /// Returns false if the user doesn't exist.
    pub async fn update_last_login<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
