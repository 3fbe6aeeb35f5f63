/// Audit trail of activation-code issuance
///
/// Every issued code leaves one row: who it was for, which tenant it created,
/// and a free-form description of the sale or demo request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    PaidCodeIssued,
    DemoCodeIssued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditEventKind,
    pub email: String,
    pub tenant_id: Option<Uuid>,
    pub detail: String,

    /// Hex SHA-256 of the requester's IP address, never the address itself
    pub ip_hash: Option<String>,

    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAuditEvent {
    pub kind: AuditEventKind,
    pub email: String,
    pub tenant_id: Option<Uuid>,
    pub detail: String,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEvent {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateAuditEvent,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditEvent>(
            r#"
            INSERT INTO audit_events (kind, email, tenant_id, detail, ip_hash, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, kind, email::text AS email, tenant_id, detail, ip_hash, user_agent, created_at
            "#,
        )
        .bind(data.kind)
        .bind(data.email)
        .bind(data.tenant_id)
        .bind(data.detail)
        .bind(data.ip_hash)
        .bind(data.user_agent)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Lists events for a tenant, oldest first
    pub async fn list_for_tenant<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, kind, email::text AS email, tenant_id, detail, ip_hash, user_agent, created_at
            FROM audit_events
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await
    }
}
