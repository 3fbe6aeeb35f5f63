/// Membership model and database operations
///
/// Links a user to a tenant with a role and a status. There is at most one
/// membership per (tenant, user) pair, so every write is an upsert.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE memberships (
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role TEXT NOT NULL DEFAULT 'USER',
///     status TEXT NOT NULL DEFAULT 'ACTIVE',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (tenant_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **ADMIN**: manages the tenant, issues activation codes
/// - **MANAGER**: admin-tier access to the tenant's back office
/// - **USER**: regular access
///
/// # Example
///
/// ```no_run
/// use atlascrm_shared::models::membership::{Membership, MembershipRole, MembershipStatus};
/// use atlascrm_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let (tenant_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
///
/// Membership::upsert(
///     &pool,
///     tenant_id,
///     user_id,
///     MembershipRole::Admin,
///     MembershipStatus::Active,
///     Utc::now(),
/// )
/// .await?;
///
/// let active = Membership::find_active(&pool, user_id).await?;
/// assert!(active.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Roles within a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipRole {
    /// Tenant administrator
    Admin,

    /// Back-office manager
    Manager,

    /// Regular user
    User,
}

impl MembershipRole {
    /// Converts role to its stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Admin => "ADMIN",
            MembershipRole::Manager => "MANAGER",
            MembershipRole::User => "USER",
        }
    }

    /// Parses a role, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(MembershipRole::Admin),
            "MANAGER" => Some(MembershipRole::Manager),
            "USER" => Some(MembershipRole::User),
            _ => None,
        }
    }

    /// ADMIN and MANAGER are admin-tier
    pub fn is_admin_tier(&self) -> bool {
        matches!(self, MembershipRole::Admin | MembershipRole::Manager)
    }
}

impl std::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a membership currently grants access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipStatus {
    Active,
    Suspended,
}

/// Membership model representing a user-tenant relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Tenant ID
    pub tenant_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the tenant
    pub role: MembershipRole,

    /// Access status
    pub status: MembershipStatus,

    /// When the membership was created
    pub created_at: DateTime<Utc>,

    /// When the membership was last updated
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Active memberships grant access
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Creates a membership or overwrites role and status of the existing one
    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
        status: MembershipStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (tenant_id, user_id, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (tenant_id, user_id) DO UPDATE
                SET role = EXCLUDED.role,
                    status = EXCLUDED.status,
                    updated_at = EXCLUDED.updated_at
            RETURNING tenant_id, user_id, role, status, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .bind(status)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Creates an ACTIVE membership unless one already exists for the pair
    ///
    /// Returns the stored row either way; an existing row is never modified.
    pub async fn insert_if_absent<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (tenant_id, user_id, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'ACTIVE', $4, $4)
            ON CONFLICT (tenant_id, user_id) DO UPDATE SET tenant_id = EXCLUDED.tenant_id
            RETURNING tenant_id, user_id, role, status, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds the user's first ACTIVE membership with an admin-tier role
    pub async fn find_privileged<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT tenant_id, user_id, role, status, created_at, updated_at
            FROM memberships
            WHERE user_id = $1
              AND status = 'ACTIVE'
              AND role IN ('ADMIN', 'MANAGER')
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the user's first ACTIVE membership of any role
    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT tenant_id, user_id, role, status, created_at, updated_at
            FROM memberships
            WHERE user_id = $1 AND status = 'ACTIVE'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_admin_tier() {
        assert!(MembershipRole::Admin.is_admin_tier());
        assert!(MembershipRole::Manager.is_admin_tier());
        assert!(!MembershipRole::User.is_admin_tier());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(MembershipRole::parse("admin"), Some(MembershipRole::Admin));
        assert_eq!(MembershipRole::parse(" Manager "), Some(MembershipRole::Manager));
        assert_eq!(MembershipRole::parse("USER"), Some(MembershipRole::User));
        assert_eq!(MembershipRole::parse("owner"), None);
    }

    #[test]
    fn test_role_serializes_uppercase() {
        let json = serde_json::to_string(&MembershipRole::Manager).unwrap();
        assert_eq!(json, "\"MANAGER\"");

        let status: MembershipStatus = serde_json::from_str("\"SUSPENDED\"").unwrap();
        assert_eq!(status, MembershipStatus::Suspended);
    }
}
