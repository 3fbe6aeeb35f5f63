/// Activation code model and database operations
///
/// An activation code is bound to an email and a tenant at issuance. It moves
/// from issued to either redeemed or expired, and both end states are final.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE activation_codes (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     code_hash CHAR(64) NOT NULL UNIQUE,
///     kind TEXT NOT NULL,              -- 'DEMO' | 'PAID'
///     email CITEXT NOT NULL,
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     redeemed_at TIMESTAMPTZ,
///     redeemed_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use atlascrm_shared::models::activation_code::ActivationCode;
/// use atlascrm_shared::auth::token::digest_code;
/// use atlascrm_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let mut tx = pool.begin().await?;
///
/// // Only one concurrent caller gets a row back
/// if let Some(code) = ActivationCode::claim(&mut *tx, &digest_code("abcd-efgh-jkmn-pqrs"), Utc::now()).await? {
///     println!("grants {} in {}", code.kind.granted_role(), code.tenant_id);
/// }
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::membership::MembershipRole;

const CODE_COLUMNS: &str = "id, code_hash, kind, email::text AS email, tenant_id, expires_at, \
                            redeemed_at, redeemed_by, created_at";

/// What kind of entitlement a code carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivationCodeKind {
    /// Trial access from the public demo form
    Demo,

    /// Purchased access issued by an administrator
    Paid,
}

impl ActivationCodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationCodeKind::Demo => "DEMO",
            ActivationCodeKind::Paid => "PAID",
        }
    }

    /// Role granted on redemption
    pub fn granted_role(&self) -> MembershipRole {
        match self {
            ActivationCodeKind::Paid => MembershipRole::Admin,
            ActivationCodeKind::Demo => MembershipRole::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivationCode {
    pub id: Uuid,

    #[serde(skip_serializing)]
    pub code_hash: String,

    pub kind: ActivationCodeKind,

    /// Email the code was issued to
    pub email: String,

    /// Tenant created for this code
    pub tenant_id: Uuid,

    pub expires_at: DateTime<Utc>,

    pub redeemed_at: Option<DateTime<Utc>>,

    pub redeemed_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

/// Input for issuing a code
#[derive(Debug, Clone)]
pub struct CreateActivationCode {
    pub code_hash: String,
    pub kind: ActivationCodeKind,
    pub email: String,
    pub tenant_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ActivationCode {
    /// Unredeemed and expiring strictly after `now`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.redeemed_at.is_none() && self.expires_at > now
    }

    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateActivationCode,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO activation_codes (code_hash, kind, email, tenant_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CODE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ActivationCode>(&query)
            .bind(data.code_hash)
            .bind(data.kind)
            .bind(data.email)
            .bind(data.tenant_id)
            .bind(data.expires_at)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Marks the code redeemed if it is still redeemable
    ///
    /// Of any number of concurrent callers exactly one receives the row;
    /// the rest see `None`, as do callers with an unknown or expired code.
    pub async fn claim<'e, E: PgExecutor<'e>>(
        executor: E,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE activation_codes
            SET redeemed_at = $2
            WHERE code_hash = $1 AND redeemed_at IS NULL AND expires_at > $2
            RETURNING {CODE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ActivationCode>(&query)
            .bind(code_hash)
            .bind(now)
            .fetch_optional(executor)
            .await
    }

    /// Records who redeemed the code
    pub async fn set_redeemed_by<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE activation_codes SET redeemed_by = $2 WHERE id = $1")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
