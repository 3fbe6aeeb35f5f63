/// Tenant model and database operations
///
/// A tenant is an organization. Users reach it through the Membership model.
/// Registered users share one well-known default tenant; every activation code
/// gets a dedicated tenant of its own.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use atlascrm_shared::models::tenant::{Tenant, DEFAULT_TENANT_ID};
/// use atlascrm_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let acme = Tenant::create(&pool, "Acme", Utc::now()).await?;
/// let shared = Tenant::upsert_default(&pool, "AtlasCRM", Utc::now()).await?;
/// assert_eq!(shared.id, DEFAULT_TENANT_ID);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Fixed id of the shared tenant that self-registered users join
pub const DEFAULT_TENANT_ID: Uuid = Uuid::from_u128(0x00000000_0000_4000_8000_000000000001);

/// Tenant model representing an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    /// Unique tenant ID
    pub id: Uuid,

    /// Organization name
    pub name: String,

    /// When the tenant was created
    pub created_at: DateTime<Utc>,

    /// When the tenant was last updated
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Creates a tenant with a fresh id
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name, created_at, updated_at)
            VALUES ($1, $2, $2)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds a tenant by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Ensures the default tenant exists, leaving an existing name untouched
    pub async fn ensure_default<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        // The no-op update makes RETURNING yield the existing row
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(DEFAULT_TENANT_ID)
        .bind(name)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Creates the default tenant or renames it to `name`
    pub async fn upsert_default<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name, updated_at = EXCLUDED.updated_at
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(DEFAULT_TENANT_ID)
        .bind(name)
        .bind(now)
        .fetch_one(executor)
        .await
    }
}
