//! PostgreSQL credential store
//!
//! Composite operations run in one transaction each; dropping the
//! transaction on an early `?` rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    CredentialStore, IssueActivationCode, IssuedCodeRecord, Redemption, SeededUser, StoreError,
    StoreResult,
};
use crate::db::pool;
use crate::models::activation_code::{ActivationCode, CreateActivationCode};
use crate::models::audit_event::{AuditEvent, CreateAuditEvent};
use crate::models::membership::{Membership, MembershipRole, MembershipStatus};
use crate::models::password_reset_token::PasswordResetToken;
use crate::models::session::Session;
use crate::models::tenant::{Tenant, DEFAULT_TENANT_ID};
use crate::models::user::{CreateUser, User};

/// Credential store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        User::update_last_login(&self.pool, user_id, at).await?;
        Ok(())
    }

    async fn register_user(
        &self,
        user: CreateUser,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<(User, Membership)> {
        let mut tx = self.pool.begin().await?;

        let user = match User::create(&mut *tx, user, now).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(StoreError::Conflict("user email")),
            Err(e) => return Err(e.into()),
        };

        Tenant::ensure_default(&mut *tx, default_tenant_name, now).await?;
        let membership = Membership::upsert(
            &mut *tx,
            DEFAULT_TENANT_ID,
            user.id,
            MembershipRole::User,
            MembershipStatus::Active,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok((user, membership))
    }

    async fn seed_user(
        &self,
        user: CreateUser,
        role: MembershipRole,
        organization_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SeededUser> {
        let mut tx = self.pool.begin().await?;

        let tenant = Tenant::upsert_default(&mut *tx, organization_name, now).await?;
        let user = User::upsert_seeded(&mut *tx, user, now).await?;
        let membership = Membership::upsert(
            &mut *tx,
            tenant.id,
            user.id,
            role,
            MembershipStatus::Active,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(SeededUser {
            user,
            tenant,
            membership,
        })
    }

    async fn find_privileged_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(Membership::find_privileged(&self.pool, user_id).await?)
    }

    async fn find_active_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(Membership::find_active(&self.pool, user_id).await?)
    }

    async fn ensure_default_membership(
        &self,
        user_id: Uuid,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Membership> {
        let mut tx = self.pool.begin().await?;

        Tenant::ensure_default(&mut *tx, default_tenant_name, now).await?;
        let membership = Membership::insert_if_absent(
            &mut *tx,
            DEFAULT_TENANT_ID,
            user_id,
            MembershipRole::User,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(Tenant::find_by_id(&self.pool, id).await?)
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        Ok(Session::create(&self.pool, token_hash, user_id, expires_at, now).await?)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(Session::find_by_token_hash(&self.pool, token_hash).await?)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(Session::delete_by_token_hash(&self.pool, token_hash).await?)
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(Session::delete_for_user(&self.pool, user_id).await?)
    }

    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken> {
        let mut tx = self.pool.begin().await?;

        let invalidated = PasswordResetToken::invalidate_outstanding(&mut *tx, user_id, now).await?;
        let token =
            PasswordResetToken::create(&mut *tx, token_hash, user_id, expires_at, now).await?;

        tx.commit().await?;
        debug!(user_id = %user_id, invalidated, "Replaced password reset token");
        Ok(token)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let Some(token) = PasswordResetToken::claim(&mut *tx, token_hash, now).await? else {
            return Ok(None);
        };

        if !User::update_password_hash(&mut *tx, token.user_id, new_password_hash, now).await? {
            return Err(StoreError::NotFound("user"));
        }
        let revoked = Session::delete_for_user(&mut *tx, token.user_id).await?;

        tx.commit().await?;
        debug!(user_id = %token.user_id, revoked, "Consumed password reset token");
        Ok(Some(token.user_id))
    }

    async fn issue_activation_code(
        &self,
        issue: IssueActivationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<IssuedCodeRecord> {
        let mut tx = self.pool.begin().await?;

        let tenant = Tenant::create(&mut *tx, &issue.tenant_name, now).await?;
        let code = ActivationCode::create(
            &mut *tx,
            CreateActivationCode {
                code_hash: issue.code_hash,
                kind: issue.kind,
                email: issue.email.clone(),
                tenant_id: tenant.id,
                expires_at: issue.expires_at,
            },
            now,
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("activation code")
            } else {
                e.into()
            }
        })?;
        AuditEvent::create(
            &mut *tx,
            CreateAuditEvent {
                kind: issue.audit_kind,
                email: issue.email,
                tenant_id: Some(tenant.id),
                detail: issue.audit_detail,
                ip_hash: issue.ip_hash,
                user_agent: issue.user_agent,
            },
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(IssuedCodeRecord { tenant, code })
    }

    async fn redeem_activation_code(
        &self,
        code_hash: &str,
        placeholder_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Redemption>> {
        let mut tx = self.pool.begin().await?;

        let Some(mut code) = ActivationCode::claim(&mut *tx, code_hash, now).await? else {
            return Ok(None);
        };

        let user_created = User::find_by_email(&mut *tx, &code.email).await?.is_none();
        let user = User::upsert_for_sign_in(&mut *tx, &code.email, placeholder_hash, now).await?;
        let membership = Membership::upsert(
            &mut *tx,
            code.tenant_id,
            user.id,
            code.kind.granted_role(),
            MembershipStatus::Active,
            now,
        )
        .await?;
        ActivationCode::set_redeemed_by(&mut *tx, code.id, user.id).await?;

        tx.commit().await?;
        code.redeemed_by = Some(user.id);
        Ok(Some(Redemption {
            user,
            code,
            membership,
            user_created,
        }))
    }

    async fn audit_events_for_tenant(&self, tenant_id: Uuid) -> StoreResult<Vec<AuditEvent>> {
        Ok(AuditEvent::list_for_tenant(&self.pool, tenant_id).await?)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(pool::health_check(&self.pool).await?)
    }
}
